use omop_synth::explore::{self, CdmSummary, ConceptCount};
use omop_synth::CdmSource;
use std::time::Instant;

pub fn run(
    source: &dyn CdmSource,
    top: usize,
    bin_width: u32,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if !json && !quiet {
        eprintln!("Summarizing {}...", source.describe());
    }

    let start_time = Instant::now();
    let store = source.open()?;
    let summary = explore::summarize(&store, top, bin_width)?;
    let elapsed = start_time.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("✓ Summary completed in {:.3?}\n", elapsed);
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CdmSummary) {
    println!("{:<28} {:>12}", "Table", "Rows");
    println!("{}", "─".repeat(41));
    for t in &summary.tables {
        println!("{:<28} {:>12}", t.table, t.rows);
    }
    println!("{}", "─".repeat(41));
    println!("{:<28} {:>12}", "TOTAL", summary.total_rows);
    println!();

    print_concepts("Gender", &summary.gender);

    let hist = &summary.year_of_birth;
    println!("Year of birth ({}-year bins):", hist.bin_width);
    let widest = hist.bins.iter().map(|b| b.count).max().unwrap_or(0);
    for bin in &hist.bins {
        println!(
            "  {}-{}  {:>8}  {}",
            bin.start,
            bin.end,
            bin.count,
            bar(bin.count, widest, 30)
        );
    }
    println!();

    print_concepts("Top visit concepts", &summary.top_visits);
    print_concepts("Top condition concepts", &summary.top_conditions);
    print_concepts("Top drug concepts", &summary.top_drugs);

    println!("Events per person (persons with at least one event):");
    for e in &summary.events_per_person {
        match (e.min, e.mean, e.max) {
            (Some(min), Some(mean), Some(max)) => println!(
                "  {:<24} persons {:>8}  min {:>4}  mean {:>7.2}  max {:>4}",
                e.table, e.persons_with_events, min, mean, max
            ),
            _ => println!("  {:<24} no events", e.table),
        }
    }
    println!();

    let integrity = &summary.integrity;
    println!("Integrity:");
    println!(
        "  persons without observation period  {}",
        integrity.persons_without_observation_period
    );
    for (label, counts) in [
        ("orphan person_id", &integrity.orphan_person_rows),
        ("visit of another person", &integrity.visit_person_mismatches),
        ("dangling visit reference", &integrity.dangling_visit_references),
        ("end before start", &integrity.end_before_start),
    ] {
        for t in counts.iter().filter(|t| t.rows > 0) {
            println!("  {:<24} {:<22} {:>8}", label, t.table, t.rows);
        }
    }
    if integrity.person_links_ok() {
        println!("  ✓ every person_id resolves");
    } else {
        println!("  ✗ broken person references found");
    }
}

fn print_concepts(title: &str, concepts: &[ConceptCount]) {
    println!("{}:", title);
    if concepts.is_empty() {
        println!("  (none)");
    }
    for c in concepts {
        println!(
            "  {:>10}  {:<34} {:>8}",
            c.concept_id,
            c.concept_name.as_deref().unwrap_or("-"),
            c.count
        );
    }
    println!();
}

/// Horizontal bar scaled against the largest count
fn bar(count: i64, max: i64, width: usize) -> String {
    if max <= 0 {
        return String::new();
    }
    let len = (count as f64 / max as f64 * width as f64).round() as usize;
    "█".repeat(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_scaling() {
        assert_eq!(bar(10, 10, 5).chars().count(), 5);
        assert_eq!(bar(5, 10, 4).chars().count(), 2);
        assert_eq!(bar(3, 0, 4), "");
    }
}
