#![no_main]

use libfuzzer_sys::fuzz_target;
use cmsig::{ber, ContentInfo};
use cmsig::anyset::AnySet;
use cmsig::cert::Cert;

fuzz_target!(|data: &[u8]| {
    let (which, data) = match data.split_first() {
        Some((first, data)) => (*first, data),
        None => return,
    };

    match which % 4 {
        0 => {
            if let Ok(der) = ber::normalize(data) {
                assert_eq!(ber::normalize(&der).ok(), Some(der));
            }
        }
        1 => { let _ = AnySet::decode(data); },
        2 => { let _ = Cert::decode(data); },
        3 => {
            let sd = match ContentInfo::decode_ber(data) {
                Ok(info) => info.signed_data(),
                Err(_) => return,
            };
            if let Ok(sd) = sd {
                let _ = sd.certificates();
                let _ = sd.verify(None);
                for info in sd.signer_infos() {
                    let _ = info.signer_identifier();
                }
            }
        }
        _ => panic!("what?"),
    }
});
