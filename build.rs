use std::env;

const CHIPS: &[&str] = &["STM32F100", "STM32F101", "STM32F103", "STM32F105", "STM32F107"];

fn main() {
    // Zero chips is fine, only the engine and the simulated timer are built then.
    let enabled: Vec<String> = CHIPS
        .iter()
        .filter(|chip| env::var_os(format!("CARGO_FEATURE_{}", chip)).is_some())
        .map(|chip| chip.to_ascii_lowercase())
        .collect();

    if enabled.len() > 1 {
        panic!(
            "Multiple stm32xx Cargo features enabled: {}",
            enabled.join(", ")
        );
    }
}
