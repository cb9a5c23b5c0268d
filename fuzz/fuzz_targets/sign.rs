// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
////////////////////////////////////////////////////////////////////////////////

#![no_main]
use cosec::{decode_sign1, Parameter, TagPolicy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut storage = [Parameter::default(); 8];
    if let Ok(msg) = decode_sign1(data, TagPolicy::Optional, &[], &mut storage) {
        let _ = msg.verify(b"aad", Some(b"detached"), |_sig, inputs| {
            inputs.tbs_vec().map(|_| ())
        });
    }
});
