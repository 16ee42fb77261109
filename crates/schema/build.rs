use std::path::Path;

fn main() {
    let schema_path = Path::new("records.fbs");

    println!("cargo:rerun-if-changed={}", schema_path.display());
    println!("cargo:rerun-if-env-changed=SHMHEAP_REGENERATE_SCHEMA");

    // src/records_generated.rs is checked in; regenerate it only on request so
    // builds do not depend on a matching flatc being installed.
    if std::env::var_os("SHMHEAP_REGENERATE_SCHEMA").is_none() {
        return;
    }

    flatc_rust::run(flatc_rust::Args {
        inputs: &[schema_path],
        out_dir: Path::new("src/"),
        ..Default::default()
    })
    .expect("Failed to generate Rust code from FlatBuffer schema");
}
