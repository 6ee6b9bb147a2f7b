fn main() {
    // ESP-IDF link/search paths are only meaningful for device builds;
    // host builds (tests, simulation) must not require an IDF toolchain.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
