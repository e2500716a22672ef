use std::{env, fs};
use cmsig::ContentInfo;


fn main() {
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            println!("Usage: readp7 <path> [<content>]");
            return
        }
    };
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            println!("Can’t read file: {}", err);
            return;
        }
    };
    let detached = match env::args().nth(2).map(fs::read).transpose() {
        Ok(detached) => detached,
        Err(err) => {
            println!("Can’t read content file: {}", err);
            return;
        }
    };

    let signed_data = match ContentInfo::decode_ber(data.as_ref()).and_then(
        |info| info.signed_data()
    ) {
        Ok(signed_data) => signed_data,
        Err(err) => {
            println!("Can’t decode signed data: {}", err);
            return
        }
    };

    println!(
        "version {}, {} signer(s), {} certificate(s)",
        signed_data.version(),
        signed_data.signer_infos().len(),
        signed_data.certificate_set().map(|set| set.len()).unwrap_or(0),
    );
    match signed_data.verify(detached.as_deref()) {
        Ok(certs) => {
            for cert in certs {
                println!("valid signature by serial {}", cert.serial_number());
            }
        }
        Err(err) => println!("Verification failed: {}", err),
    }
}
