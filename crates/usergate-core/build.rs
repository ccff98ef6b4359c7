/// Builds the gRPC client and server code for the `user.proto` definition
/// using `tonic-prost-build`.
///
/// The generated module contains the message types for all four call shapes
/// plus the `UserService` client and server bindings. A file descriptor set is
/// written next to the generated code so the server can expose it through
/// `tonic-reflection`.
///
/// # Files and Paths
///
/// - Proto file: `proto/user.proto`
/// - Includes: `proto/`
/// - Descriptor: `$OUT_DIR/user_descriptor.bin`
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or code generation fails (for example when
/// `protoc` is not installed).
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("user_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/user.proto"], &["proto"])
        .unwrap();

    println!("cargo:rerun-if-changed=proto/user.proto");
}
