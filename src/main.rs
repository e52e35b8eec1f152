fn main() {
    std::process::exit(stellar_preflight::app::run());
}
