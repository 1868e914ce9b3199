fn main() {
    sweep_trigger::cli::run();
}
