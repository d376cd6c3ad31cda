//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `sixeats_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use sixeats_core::Meal;

fn main() {
    println!("sixeats_core ping={}", sixeats_core::ping());
    println!("sixeats_core version={}", sixeats_core::core_version());
    let labels = Meal::ALL.map(Meal::label);
    println!("sixeats_core meals={}", labels.join(","));
}
