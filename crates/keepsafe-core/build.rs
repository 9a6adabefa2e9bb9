fn main() -> Result<(), Box<dyn std::error::Error>> {
    // protoc ships with protoc-bin-vendored; nothing to install on the host
    let protoc = protoc_bin_vendored::protoc_bin_path()
        .expect("protoc-bin-vendored: no binary for this platform");
    std::env::set_var("PROTOC", protoc);

    println!("cargo:rerun-if-changed=src/proto/keepsafe.proto");
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["src/proto/keepsafe.proto"], &["src/proto"])?;
    Ok(())
}
