//! Vertical card display for pipeline results and case listings.

use trafficiq_core::{AgentResult, CaseRecord, PipelineError, VehicleIdentification};

const LABEL_WIDTH: usize = 22;

fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {label:<LABEL_WIDTH$} {value}");
}

fn opt_field(label: &str, value: Option<&str>) {
    if let Some(v) = value {
        field(label, v);
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

// ── Sections ──

fn print_vehicle_section(v: &VehicleIdentification) {
    println!("Vehicle");
    field("make", &v.make);
    field("model", &v.model);
    field("year_range", &v.year_range);
    field("color", &v.color);
    field("body_type", &v.body_type);
    field("confidence", percent(v.confidence));
    field("image_condition", v.image_condition);
    for (k, val) in &v.metadata {
        field(k, val);
    }
    println!();
}

// ── Public API ──

/// Print a vehicle identification card.
pub fn print_vehicle(image_uri: &str, v: &VehicleIdentification) {
    println!("=== {image_uri} ===");
    println!();
    print_vehicle_section(v);
}

/// Print a full run result as a card grouped by stage.
pub fn print_result(r: &AgentResult) {
    println!("=== {} [{}] ===", r.case.case_id, r.priority);
    println!("{}", r.case.summary);
    println!();

    print_vehicle_section(&r.vehicle);

    println!("Plate");
    field("ocr_fallback_used", yes_no(r.ocr_fallback_used));
    if let Some(p) = &r.plate {
        field("plate", p.plate.as_deref().unwrap_or("(unresolved)"));
        field("plate_confidence", percent(p.confidence));
    }
    println!();

    println!("Watchlist");
    field("match", yes_no(r.watchlist.is_match));
    field("reason", &r.watchlist.reason);
    if r.watchlist.is_match {
        field("match_confidence", percent(r.watchlist.match_confidence));
    }
    opt_field("record_id", r.watchlist.record_id.as_deref());
    println!();

    println!("Case");
    field("case_id", &r.case.case_id);
    field("priority", r.priority);
    field("status", r.case.status);
    opt_field("location", r.location.as_deref());
    field("evidence", &r.case.evidence_ref);
    field("created_at", r.case.created_at.to_rfc3339());
    println!();

    println!("Trace ({} steps, {:.2} ms)", r.processing_steps.len(), r.total_processing_time_ms);
    for (i, s) in r.processing_steps.iter().enumerate() {
        println!("  {:>2}. {s}", i + 1);
    }
}

/// Print a failed run with the stages it reached.
pub fn print_failure(e: &PipelineError) {
    eprintln!("Pipeline failed: {}", e.error);
    let mut source = std::error::Error::source(&e.error);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    if e.trace.is_empty() {
        eprintln!("  no stages reached");
    } else {
        let names: Vec<&str> = e.trace.iter().map(|s| s.as_str()).collect();
        eprintln!("  reached: {}", names.join(" → "));
    }
}

/// Print cases as a compact table, oldest first.
pub fn print_cases(cases: &[CaseRecord]) {
    if cases.is_empty() {
        println!("No cases recorded.");
        return;
    }
    println!(
        "{:<14} {:<3} {:<22} {:<10} {:<25}",
        "CASE", "PRI", "VEHICLE", "PLATE", "CREATED"
    );
    for c in cases {
        let vehicle = format!("{} {}", c.vehicle_make, c.vehicle_model);
        println!(
            "{:<14} {:<3} {:<22} {:<10} {:<25}",
            c.case_id,
            c.priority.as_str(),
            vehicle,
            c.plate_number.as_deref().unwrap_or("-"),
            c.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }
    println!();
    println!("{} case(s)", cases.len());
}
