fn main() {
    // exposes package metadata (name, version, authors...) to `metadata.rs`
    built::write_built_file().expect("Failed to acquire build-time information");
}
