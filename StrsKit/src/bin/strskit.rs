fn main() -> anyhow::Result<()> {
    strskit::cli::run_cli()
}
