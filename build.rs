use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    // Messages, client and server glue for both contracts, plus the
    // descriptor set the reflection service serves.
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(out_dir.join("secretlink_descriptor.bin"))
        .compile_protos(
            &[
                "proto/secretlink/provider/v1/provider.proto",
                "proto/secretlink/generator/v1/generator.proto",
            ],
            &["proto"],
        )?;

    Ok(())
}
