//! Human-readable alert and status lines.

/// Alert body for a low hopper.
pub fn format_low_alert(hopper_kg: f64, percent: Option<f64>, threshold_kg: f64) -> String {
    match percent {
        Some(percent) => format!(
            "Hopper low: {:.1} kg remaining ({:.1}% of capacity). Threshold: {:.1} kg.",
            hopper_kg, percent, threshold_kg
        ),
        None => format!(
            "Hopper low: {:.1} kg remaining. Threshold: {:.1} kg.",
            hopper_kg, threshold_kg
        ),
    }
}

/// Status line logged when the level is above the threshold.
pub fn format_status(hopper_kg: f64, percent: Option<f64>, threshold_kg: f64) -> String {
    match percent {
        Some(percent) => format!(
            "Hopper OK: {:.1} kg ({:.1}%), threshold {:.1} kg",
            hopper_kg, percent, threshold_kg
        ),
        None => format!("Hopper OK: {:.1} kg, threshold {:.1} kg", hopper_kg, threshold_kg),
    }
}
