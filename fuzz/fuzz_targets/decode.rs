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
use cosec::{DecodeError, Decoder, EncodeConfig, Encoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Walk every item, skipping containers half of the time.
    let mut dec = Decoder::new(data);
    let mut skip = false;
    loop {
        match dec.next() {
            Ok(item) => {
                if skip && dec.skip(&item).is_err() {
                    break;
                }
                skip = !skip;
            }
            Err(DecodeError::NoMoreItems) => {
                let _ = dec.finish();
                break;
            }
            Err(_) => break,
        }
    }

    // Anything that decodes to a value must re-encode in every configuration.
    let mut dec = Decoder::new(data);
    if let Ok(value) = dec.next_value() {
        for config in [
            EncodeConfig::preferred(),
            EncodeConfig::no_preferred(),
            EncodeConfig::cde(),
            EncodeConfig::dcbor(),
        ] {
            let mut buf = Vec::new();
            let mut enc = Encoder::growable(&mut buf).with_config(config);
            enc.append_value(&value);
            let _ = enc.finish();
        }
    }
});
