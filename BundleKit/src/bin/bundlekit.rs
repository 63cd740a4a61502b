fn main() -> anyhow::Result<()> {
    bundlekit::cli::run_cli()
}
