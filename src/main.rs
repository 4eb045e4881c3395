mod charts;
mod scenarios;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use banner_rotator::logger::{sanitize_filename, ConsoleReceiver, FileReceiver, LogEvent, Logger};
use banner_rotator::repository::MemoryRepository;
use banner_rotator::rotator::BannerRotator;
use banner_rotator::snapshot::Snapshot;
use banner_rotator::utils::{RAND_SEED, TOTAL_ROTATION_RUNS, VERBOSE_SELECTION};
use banner_rotator::{errln, log, logln};

use scenarios::get_scenario_catalog;

/// Serve `count` banners for `place_slug` out of a snapshot file, printing each pick
fn pick_from_snapshot(path: &Path, place_slug: &str, count: usize, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = Snapshot::load(path)?;
    let mut rotator = BannerRotator::new(MemoryRepository::new(snapshot));
    let mut rng = rand::thread_rng();

    for _ in 0..count {
        match rotator.serve(place_slug, chrono::Utc::now(), &mut rng, logger) {
            Ok(banner) => println!("#{} {} -> {} ({})", banner.banner_id, banner.name, banner.url, banner.url_target.as_str()),
            Err(e) => {
                errln!(logger, LogEvent::Validation, "{}", e);
                return Err(e.into());
            }
        }
    }

    println!();
    for banner in rotator.repository.banners().iter().filter(|b| b.views > 0) {
        println!("#{} {}: views {}, clicks {}", banner.banner_id, banner.name, banner.views_str(), banner.clicks_str());
    }
    Ok(())
}

fn parse_number(args: &[String], idx: usize, what: &str, default: u64) -> u64 {
    match args.get(idx) {
        Some(arg) => match arg.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid {} parameter '{}'. Expected a number.", what, arg);
                std::process::exit(1);
            }
        },
        None => default,
    }
}

/// Flags filtered out of the command line before positional parsing
#[derive(Debug, Default, PartialEq)]
struct Flags {
    verbose_selection: bool,
    fastbreak: bool,
}

/// Split `--verbose <target>` and `--fastbreak` from the positional arguments
fn parse_flags(raw_args: &[String]) -> Result<(Vec<String>, Flags), String> {
    let mut args = Vec::new();
    let mut flags = Flags::default();
    let mut iter = raw_args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--verbose" => match iter.next().map(String::as_str) {
                Some("selection") => flags.verbose_selection = true,
                Some(other) => return Err(format!("unknown verbose target '{}', expected 'selection'", other)),
                None => return Err("--verbose needs a target, expected 'selection'".to_string()),
            },
            "--fastbreak" => flags.fastbreak = true,
            _ => args.push(arg.clone()),
        }
    }
    Ok((args, flags))
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    let (args, flags) = match parse_flags(&raw_args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: {} [--verbose selection] [--fastbreak] [charts | pick <snapshot.json> <place-slug> [count] | all | <scenario> [iterations] [start]]", raw_args.first().map_or("banner-rotator", String::as_str));
            std::process::exit(1);
        }
    };
    let fastbreak = flags.fastbreak;
    if flags.verbose_selection {
        VERBOSE_SELECTION.store(true, Ordering::Relaxed);
    }

    let mut logger = Logger::new();
    if VERBOSE_SELECTION.load(Ordering::Relaxed) {
        match FileReceiver::new(&PathBuf::from("log/selection.log"), vec![LogEvent::Selection]) {
            Ok(receiver) => {
                logger.add_receiver(receiver);
            }
            Err(e) => eprintln!("Warning: cannot open selection log: {}", e),
        }
    }

    if args.len() > 1 && args[1] == "charts" {
        match charts::generate_all_charts() {
            Ok(()) => {
                println!("All chart generation completed successfully.");
            }
            Err(e) => {
                eprintln!("Error generating charts: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if args.len() > 1 && args[1] == "pick" {
        if args.len() < 4 {
            eprintln!("Usage: {} pick <snapshot.json> <place-slug> [count]", args[0]);
            std::process::exit(1);
        }
        let count = parse_number(&args, 4, "count", 1) as usize;
        if let Err(e) = pick_from_snapshot(&PathBuf::from(&args[2]), &args[3], count, &mut logger) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if args.len() > 1 {
        let scenario_arg = &args[1];
        let iterations = parse_number(&args, 2, "iterations", 1);
        let start_iteration = parse_number(&args, 3, "start iteration", 0);

        let all_scenarios = get_scenario_catalog();

        let scenarios: Vec<_> = if scenario_arg == "all" {
            all_scenarios.clone()
        } else {
            match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
                Some(scenario) => vec![scenario.clone()],
                None => {
                    eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                    eprintln!("Available scenarios:");
                    for s in &all_scenarios {
                        eprintln!("  - {}", s.short_name);
                    }
                    std::process::exit(1);
                }
            }
        };

        // Individual validations only on console for a single scenario run once
        if scenario_arg != "all" && iterations == 1 {
            logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
        } else {
            logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
        }

        let summary_receiver_id = match FileReceiver::new(&PathBuf::from("log/summary.log"), vec![LogEvent::Validation]) {
            Ok(receiver) => Some(logger.add_receiver(receiver)),
            Err(e) => {
                eprintln!("Warning: cannot open summary log: {}", e);
                None
            }
        };

        TOTAL_ROTATION_RUNS.store(0, Ordering::Relaxed);

        let what = if scenario_arg == "all" { "all scenarios".to_string() } else { format!("scenario '{}'", scenario_arg) };
        if iterations > 1 {
            logln!(&mut logger, LogEvent::Validation, "Running {} {} times...\n", what, iterations);
        } else {
            logln!(&mut logger, LogEvent::Validation, "Running {}...\n", what);
        }

        let mut failures = 0;
        'scenarios: for scenario in &scenarios {
            log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

            let scenario_log = PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name)));
            let scenario_receiver_id = match FileReceiver::new(&scenario_log, vec![LogEvent::Rotation, LogEvent::Scenario]) {
                Ok(receiver) => Some(logger.add_receiver(receiver)),
                Err(e) => {
                    eprintln!("Warning: cannot open {}: {}", scenario_log.display(), e);
                    None
                }
            };

            for i in start_iteration..(start_iteration + iterations) {
                let iteration_num = i - start_iteration + 1;
                if iterations > 1 {
                    log!(&mut logger, LogEvent::Validation, "[{}/{}] ", iteration_num, iterations);
                }

                RAND_SEED.store(i, Ordering::Relaxed);

                match (scenario.run)(scenario.short_name, &mut logger) {
                    Ok(()) => {
                        if iterations > 1 {
                            logln!(&mut logger, LogEvent::Validation, "✓");
                        } else {
                            logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        if iterations > 1 {
                            logln!(&mut logger, LogEvent::Validation, "✗");
                        } else {
                            logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                        }

                        if fastbreak {
                            if let Some(id) = scenario_receiver_id {
                                logger.remove_receiver(id);
                            }
                            logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                            logln!(&mut logger, LogEvent::Validation, "Error at iteration {}/{} (seed {}): {}", iteration_num, iterations, i, e);
                            break 'scenarios;
                        }
                    }
                }

                let _ = logger.flush();
            }

            if let Some(id) = scenario_receiver_id {
                logger.remove_receiver(id);
            }
        }

        let total_runs = TOTAL_ROTATION_RUNS.load(Ordering::Relaxed);
        logln!(&mut logger, LogEvent::Validation, "\nTotal rotation runs completed: {}", total_runs);

        if let Some(id) = summary_receiver_id {
            logger.remove_receiver(id);
        }
        if failures > 0 {
            std::process::exit(1);
        }
    } else {
        // Default: the weighted fairness scenario with rotation summaries on console
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Rotation, LogEvent::Scenario]));
        if let Err(e) = scenarios::weighted_fairness::run("weighted_fairness", &mut logger) {
            eprintln!("Error running scenario: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_parse_flags() {
        let (args, flags) = parse_flags(&strings(&["bin", "--verbose", "selection", "all", "--fastbreak", "5"])).unwrap();
        assert_eq!(args, strings(&["bin", "all", "5"]));
        assert_eq!(flags, Flags { verbose_selection: true, fastbreak: true });
    }

    #[test]
    fn test_unknown_verbose_target_is_an_error() {
        let err = parse_flags(&strings(&["bin", "--verbose", "auction", "all"])).unwrap_err();
        assert!(err.contains("'auction'"), "{}", err);
        assert!(parse_flags(&strings(&["bin", "--verbose"])).is_err());
    }
}
