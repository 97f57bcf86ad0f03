fn main() -> std::process::ExitCode {
    avif_sweep::cli::run()
}
