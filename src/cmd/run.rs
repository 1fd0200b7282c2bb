//! Orchestrates one scan invocation: loads targets and routes, builds the
//! engine's `Config`, drives the scheduler, and prints results.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tokio::sync::mpsc;

use crate::cli::ScanCmd;
use crate::config::Config;
use crate::errors::MultiError;
use crate::progress::{NullProgressBar, ProgressBar};
use crate::proute::{self, Api};
use crate::result::{self, OutputFormat, ScanResult};
use crate::route::{Route, RouteMap, Target};
use crate::routeio;
use crate::scheduler;
use crate::targetio;

pub async fn run(args: &ScanCmd) -> Result<()> {
    let config = args.to_config();
    config.validate().map_err(|e| anyhow!("{e}"))?;
    let config = Arc::new(config);

    let targets = load_targets(args)?;
    if targets.is_empty() {
        bail!("no targets provided (pass TARGET arguments or --target-file)");
    }

    let (mut apis, errors) = load_apis(args)?;
    if !errors.is_empty() {
        info!(
            "{} schema parse error(s) accumulated while loading API specs (non-fatal, see debug log)",
            errors.errors.len()
        );
        errors.log_all();
    }
    if !config.filter_apis.is_empty() {
        apis.retain(|a| config.filter_apis.contains(&a.id));
    }

    let plain_routes = load_plain_routes(args)?;

    if args.dry_run {
        for api in &apis {
            print!("{}", proute::debug_print(api));
        }
        for route in &plain_routes {
            println!("{:<7} {}", route.method, route.path);
        }
        return Ok(());
    }

    let targets: Vec<Arc<Target>> = targets.into_iter().map(Arc::new).collect();
    install_ctrlc_handler(&targets);

    // `--max-routes` is a smoke-test knob; it always flattens to a single
    // scan over the combined, truncated route set rather than feeding the
    // two-phase split.
    if let Some(n) = args.max_routes {
        let mut all_routes = proute::routes_for(&apis, &[]);
        all_routes.extend(plain_routes);
        all_routes.truncate(n);
        if all_routes.is_empty() {
            bail!("no routes to scan (supply --wordlist, --api-spec, or --routes-binary)");
        }
        execute_scan(targets, all_routes, config, args.output_format(), true).await;
        return Ok(());
    }

    if config.full_scan {
        let mut all_routes = proute::routes_for(&apis, &[]);
        all_routes.extend(plain_routes);
        if all_routes.is_empty() {
            bail!("no routes to scan (supply --wordlist, --api-spec, or --routes-binary)");
        }
        execute_scan(targets, all_routes, config, args.output_format(), true).await;
    } else {
        two_phase_scan(targets, apis, plain_routes, config, args.output_format()).await?;
    }

    Ok(())
}

fn load_targets(args: &ScanCmd) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    for spec in &args.targets {
        targets.extend(targetio::parse_target_spec(spec));
    }
    if let Some(path) = &args.target_file {
        let file =
            File::open(path).with_context(|| format!("reading target file {path:?}"))?;
        targets.extend(targetio::load_target_file(BufReader::new(file))?);
    }
    Ok(targets)
}

fn load_apis(args: &ScanCmd) -> Result<(Vec<Api>, MultiError)> {
    let mut apis = Vec::new();
    let mut errors = MultiError::new();
    for path in &args.api_specs {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading API spec {path:?}"))?;
        let (api, mut errs) = routeio::load_json_api(&body)
            .with_context(|| format!("parsing API spec {path:?}"))?;
        errors.errors.append(&mut errs.errors);
        apis.push(api);
    }
    Ok((apis, errors))
}

fn load_plain_routes(args: &ScanCmd) -> Result<Vec<Route>> {
    let mut routes = Vec::new();
    if let Some(path) = &args.wordlist {
        let file = File::open(path).with_context(|| format!("reading wordlist {path:?}"))?;
        routes.extend(routeio::load_text_routes(
            BufReader::new(file),
            &args.extensions,
            "wordlist",
        )?);
    }
    if let Some(path) = &args.routes_binary {
        routes.extend(
            routeio::load_binary_file(path)
                .with_context(|| format!("reading compiled route set {path:?}"))?,
        );
    }
    Ok(routes)
}

/// Cancels every target's `CancellationToken` on Ctrl-C, so the top-level
/// scan cancellation propagates to every task.
fn install_ctrlc_handler(targets: &[Arc<Target>]) {
    let targets: Vec<Arc<Target>> = targets.to_vec();
    let _ = ctrlc::set_handler(move || {
        info!("received interrupt, cancelling all targets");
        for t in &targets {
            t.cancel.cancel();
        }
    });
}

/// Runs one scan over `routes` against `targets`, printing accepted results
/// as they arrive when `print` is set, and returns every accepted result.
async fn execute_scan(
    targets: Vec<Arc<Target>>,
    mut routes: Vec<Route>,
    config: Arc<Config>,
    format: OutputFormat,
    print: bool,
) -> Vec<ScanResult> {
    crate::route::apply_force_method(&mut routes, config.force_method);
    let route_map = Arc::new(RouteMap::build(routes, config.preflight_depth));
    let progress: Arc<dyn ProgressBar> = Arc::new(NullProgressBar);
    let capacity = (config.max_parallel_hosts * config.max_conn_per_host.max(1)).max(1);
    let (tx, mut rx) = mpsc::channel(capacity);

    let scan_handle = tokio::spawn(scheduler::run_scan(targets, route_map, config, progress, tx));

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        if print {
            result::log_result(&result, format);
        }
        results.push(result);
    }
    let _ = scan_handle.await;
    results
}

/// Phase one sends one route per API source; phase two restricts to the set
/// of APIs that returned a phase-one result and the set of targets that
/// responded.
async fn two_phase_scan(
    targets: Vec<Arc<Target>>,
    apis: Vec<Api>,
    plain_routes: Vec<Route>,
    config: Arc<Config>,
    format: OutputFormat,
) -> Result<()> {
    let phase_one_routes = proute::one_per_route_source(&apis);
    if phase_one_routes.is_empty() {
        if plain_routes.is_empty() {
            bail!("no routes to scan (supply --wordlist, --api-spec, or --routes-binary)");
        }
        info!("no API routes to probe in phase one; running a single scan over the wordlist");
        execute_scan(targets, plain_routes, config, format, true).await;
        return Ok(());
    }

    info!(
        "phase one: probing {} route(s), one per API source",
        phase_one_routes.len()
    );
    let results = execute_scan(targets.clone(), phase_one_routes, config.clone(), format, false).await;

    if results.is_empty() {
        info!("phase one produced no results; skipping phase two");
        return Ok(());
    }

    let hit_sources: Vec<String> = results
        .iter()
        .map(|r| r.route.source_id.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let hit_targets: HashSet<String> = results.iter().map(|r| r.target_label.clone()).collect();

    let mut phase_two_routes = proute::routes_for(&apis, &hit_sources);
    phase_two_routes.extend(plain_routes);

    let phase_two_targets: Vec<Arc<Target>> = targets
        .into_iter()
        .filter(|t| hit_targets.contains(&format!("{}://{}", t.scheme(), t.host_header())))
        .collect();

    info!(
        "phase two: {} route(s) against {} target(s) that produced a phase-one hit",
        phase_two_routes.len(),
        phase_two_targets.len()
    );

    execute_scan(phase_two_targets, phase_two_routes, config, format, true).await;
    Ok(())
}
