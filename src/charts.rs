use std::fs;

use plotters::prelude::*;

use banner_rotator::logger::Logger;
use banner_rotator::rotation::RotationStat;
use crate::scenarios::weighted_fairness;

/// Weights of the rotation drawn by `generate_all_charts`
const CHART_WEIGHTS: [u8; 4] = [10, 5, 3, 1];

/// Run a weighted rotation and chart its observed view shares against the weights
pub fn generate_all_charts() -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all("charts")?;

    // Rotation output is not needed here, only the statistics
    let mut logger = Logger::new();
    let stat = weighted_fairness::run_variant("Rotation for share chart", &CHART_WEIGHTS, &mut logger)?;

    generate_share_chart(&stat, "charts/view_share.png")?;

    Ok(())
}

/// Side-by-side bars of observed and expected view share per banner
pub fn generate_share_chart(stat: &RotationStat, filename: &str) -> Result<(), Box<dyn std::error::Error>> {
    if stat.banner_stats.is_empty() {
        return Err("Cannot create share chart: rotation has no banners".into());
    }

    let bars: Vec<(f64, f64)> = stat
        .banner_stats
        .iter()
        .map(|s| (s.view_share, stat.expected_share(s.banner_id)))
        .collect();
    let max_share = bars.iter().map(|&(observed, expected)| observed.max(expected)).fold(0.0, f64::max);
    let banner_count = bars.len() as f64;

    let root = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("View share over {} requests", stat.requests), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..banner_count, 0.0..max_share * 1.1)?;

    let labels: Vec<String> = stat.banner_stats.iter().map(|s| format!("#{} w={}", s.banner_id, s.weight)).collect();
    chart
        .configure_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|x| {
            let idx = x.floor() as usize;
            labels.get(idx).cloned().unwrap_or_default()
        })
        .x_desc("Banner")
        .y_desc("Share of views")
        .draw()?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, &(observed, _))| {
            let x0 = i as f64 + 0.1;
            Rectangle::new([(x0, 0.0), (x0 + 0.4, observed)], BLUE.filled())
        }))?
        .label(format!("Observed (n={})", stat.served))
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], BLUE.filled()));

    chart
        .draw_series(bars.iter().enumerate().map(|(i, &(_, expected))| {
            let x0 = i as f64 + 0.5;
            Rectangle::new([(x0, 0.0), (x0 + 0.4, expected)], RED.filled())
        }))?
        .label("Expected (weight / sum of weights)")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], RED.filled()));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;

    println!("Share chart saved to {}", filename);
    for (s, &(observed, expected)) in stat.banner_stats.iter().zip(&bars) {
        println!("  #{} {}: {:.2}% (expected {:.2}%)", s.banner_id, s.name, observed * 100.0, expected * 100.0);
    }

    Ok(())
}
