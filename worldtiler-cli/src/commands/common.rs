//! Helpers shared across run commands.

use console::style;
use worldtiler::progress::{LevelSummary, TileCounts};

/// Prints a per-level table followed by the totals.
pub fn print_levels(title: &str, levels: &[LevelSummary]) {
    println!();
    println!("{}", style(title).bold());
    println!("{}", "─".repeat(title.chars().count()));
    let mut total = TileCounts::default();
    for level in levels {
        println!(
            "  Level {:>2}: {} written, {} skipped, {} failed",
            level.level, level.counts.written, level.counts.skipped, level.counts.failed
        );
        total.add(level.counts);
    }
    let failed = if total.failed > 0 {
        style(total.failed).red().to_string()
    } else {
        total.failed.to_string()
    };
    println!(
        "  Total:    {} written, {} skipped, {} failed",
        style(total.written).green(),
        total.skipped,
        failed
    );
}

/// Levels sorted coarsest first for display.
pub fn coarsest_first(mut levels: Vec<LevelSummary>) -> Vec<LevelSummary> {
    levels.sort_by_key(|l| l.level);
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coarsest_first() {
        let levels = vec![
            LevelSummary {
                level: 3,
                counts: TileCounts::default(),
            },
            LevelSummary {
                level: 1,
                counts: TileCounts::default(),
            },
        ];
        let sorted = coarsest_first(levels);
        assert_eq!(sorted[0].level, 1);
        assert_eq!(sorted[1].level, 3);
    }
}
