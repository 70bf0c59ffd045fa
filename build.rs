use std::env;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(ossl300)");

    // Exported by openssl-sys for its direct dependents.
    let Ok(version) = env::var("DEP_OPENSSL_VERSION_NUMBER") else {
        println!("cargo:warning=OpenSSL version unknown, legacy provider support disabled");
        return;
    };
    match u64::from_str_radix(&version, 16) {
        Ok(number) if number >= 0x3_00_00_00_0 => println!("cargo:rustc-cfg=ossl300"),
        Ok(_) => {}
        Err(e) => println!("cargo:warning=Unparseable OpenSSL version {version}: {e}"),
    }
}
