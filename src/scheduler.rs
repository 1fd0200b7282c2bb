//! The scan scheduler: target supervisor + preflight scheduler + request
//! worker pool.
//!
//! The three tiers (target supervisor, preflight scheduler, request worker)
//! are realized here as two cooperating layers rather than three
//! independently-scheduled task pools: each target
//! supervisor task runs its own preflight probes inline (the "preflight
//! scheduler" tier) before fanning its routes out across up to
//! `max_conn_per_host` concurrently-spawned chunk workers (the "request
//! worker" tier). This preserves every ordering/cancellation/back-pressure
//! guarantee while avoiding a third, separately-pooled channel tier that the
//! engine's `Send`-friendly task model doesn't require. See DESIGN.md.

use std::sync::Arc;

use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use tokio::sync::{mpsc, Mutex};

use crate::baseline::{preflight_check_routes, WildcardResponse, WildcardResponses};
use crate::config::Config;
use crate::http_engine::{do_client, EngineOptions};
use crate::progress::ProgressBar;
use crate::result::ScanResult;
use crate::route::{chunk_routes, Request, Route, RouteMap, Target};
use crate::validator::{
    validate_chain, ContentLengthRange, KnownBadSites, RequestValidator, ResponseView,
    StatusCodeBlacklist, StatusCodeWhitelist, Wildcard,
};

type Body = http_body_util::Either<
    http_body_util::Full<bytes::Bytes>,
    http_body_util::Empty<bytes::Bytes>,
>;
type GenericClient = Client<HttpConnector, Body>;

/// Routes are checked for cancellation/quarantine every `CheckInterval`
/// processed items within a worker chunk.
const CHECK_INTERVAL: usize = 10;

pub fn build_generic_client() -> GenericClient {
    Client::builder(hyper_util::rt::TokioExecutor::new()).build(HttpConnector::new())
}

fn engine_options(config: &Config) -> EngineOptions {
    EngineOptions {
        max_redirects: config.max_redirects,
        timeout: config.timeout,
        user_agent: config.user_agent.clone(),
        extra_headers: config.extra_headers.clone(),
        blacklist_redirect_prefixes: config.blacklist_redirect_domains.clone(),
        read_body: config.read_body,
        read_headers: config.read_headers,
    }
}

/// Drives a full scan: `max_parallel_hosts` supervisor tasks drain `targets`
/// from a bounded input channel (capacity P, for back-pressure), streaming
/// accepted results to `output` (capacity P·C is the caller's responsibility
/// when constructing the channel).
pub async fn run_scan(
    targets: Vec<Arc<Target>>,
    route_map: Arc<RouteMap>,
    config: Arc<Config>,
    progress: Arc<dyn ProgressBar>,
    output: mpsc::Sender<ScanResult>,
) {
    let generic_client = Arc::new(build_generic_client());
    let (tx, rx) = mpsc::channel::<Arc<Target>>(config.max_parallel_hosts.max(1));
    let rx = Arc::new(Mutex::new(rx));

    let mut supervisors = Vec::with_capacity(config.max_parallel_hosts);
    for _ in 0..config.max_parallel_hosts.max(1) {
        let rx = rx.clone();
        let route_map = route_map.clone();
        let config = config.clone();
        let progress = progress.clone();
        let output = output.clone();
        let generic_client = generic_client.clone();
        supervisors.push(tokio::spawn(async move {
            loop {
                let target = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some(target) = target else { break };
                handle_target(target, &route_map, &config, &progress, &output, &generic_client)
                    .await;
            }
        }));
    }
    drop(rx);

    for t in targets {
        if tx.send(t).await.is_err() {
            break;
        }
    }
    drop(tx);

    for s in supervisors {
        let _ = s.await;
    }
}

/// Per-target lifecycle: preflight the root, then each base
/// path in turn, chunking the base's routes across up to `max_conn_per_host`
/// concurrent workers.
async fn handle_target(
    target: Arc<Target>,
    route_map: &RouteMap,
    config: &Config,
    progress: &Arc<dyn ProgressBar>,
    output: &mpsc::Sender<ScanResult>,
    generic_client: &Arc<GenericClient>,
) {
    if target.is_cancelled() {
        return;
    }

    let _ = target.host_header();
    let _ = target.http_client(config.max_conn_per_host);

    if config.preflight_enabled {
        let probes = preflight_check_routes("", "__preflight__");
        progress.add_total(probes.len() as i64);
        let root_baselines =
            run_preflight_probes(&target, &probes, config, progress, generic_client).await;
        if root_baselines.is_empty() {
            log::info!(
                "target {} failed preflight (no `/`-level baseline produced), cancelling",
                target.hostname
            );
            target.cancel.cancel();
            return;
        }
        target.baselines.lock().unwrap().merge(&root_baselines);
    }

    for (base, routes) in route_map.bases() {
        if target.is_cancelled() || target.is_quarantined() {
            break;
        }

        if config.preflight_enabled && !base.is_empty() {
            let probes = preflight_check_routes(base, "__preflight__");
            progress.add_total(probes.len() as i64);
            let baselines =
                run_preflight_probes(&target, &probes, config, progress, generic_client).await;
            target.baselines.lock().unwrap().merge(&baselines);
        }

        progress.add_total(routes.len() as i64);
        dispatch_base_routes(&target, routes, config, progress, output, generic_client).await;
    }
}

/// Issues every preflight probe for one base path, computing and returning
/// the resulting baseline set. Probes never produce a `ScanResult` — only a
/// `WildcardResponse` fingerprint.
async fn run_preflight_probes(
    target: &Arc<Target>,
    probes: &[Route],
    config: &Config,
    progress: &Arc<dyn ProgressBar>,
    generic_client: &Arc<GenericClient>,
) -> WildcardResponses {
    let opts = engine_options(config);
    let mut out = WildcardResponses::default();
    for probe in probes {
        let request = Request::new(target.clone(), probe);
        let response = do_client(&request, &opts, config.max_conn_per_host, generic_client).await;
        progress.incr(1);
        if response.status_code == 0 {
            // Transient failure on a preflight probe: no fingerprint, but not
            // fatal — other probes may still succeed.
            continue;
        }
        let full_path = request.full_path();
        let body = response.body.clone().unwrap_or_default();
        let wr = WildcardResponse::compute(
            response.status_code,
            &body,
            response.words,
            response.lines,
            &full_path,
        );
        out.push_unique(wr);
    }
    out
}

/// Spawns up to `max_conn_per_host` concurrent workers over `routes`,
/// chunked with the balanced algorithm, each bailing on
/// cancellation/quarantine every `CHECK_INTERVAL` routes.
async fn dispatch_base_routes(
    target: &Arc<Target>,
    routes: &[Route],
    config: &Config,
    progress: &Arc<dyn ProgressBar>,
    output: &mpsc::Sender<ScanResult>,
    generic_client: &Arc<GenericClient>,
) {
    let chunks = chunk_routes(routes, config.max_conn_per_host.max(1));
    let max_conn_per_host = config.max_conn_per_host;
    let quarantine_threshold = config.quarantine_threshold;
    let content_length_ignore_ranges = config.content_length_ignore_ranges.clone();
    let success_status_codes = config.success_status_codes.clone();
    let fail_status_codes = config.fail_status_codes.clone();
    let wildcard_detection = config.wildcard_detection;
    let delay = config.delay;
    let opts = engine_options(config);
    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let chunk: Vec<Route> = chunk.to_vec();
        let target = target.clone();
        let opts = opts.clone();
        let output = output.clone();
        let progress = progress.clone();
        let generic_client = generic_client.clone();
        let content_length_ignore_ranges = content_length_ignore_ranges.clone();
        let success_status_codes = success_status_codes.clone();
        let fail_status_codes = fail_status_codes.clone();
        handles.push(tokio::spawn(async move {
            process_chunk(
                target,
                chunk,
                opts,
                max_conn_per_host,
                quarantine_threshold,
                content_length_ignore_ranges,
                success_status_codes,
                fail_status_codes,
                wildcard_detection,
                delay,
                progress,
                output,
                generic_client,
            )
            .await;
        }));
    }
    for h in handles {
        let _ = h.await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_chunk(
    target: Arc<Target>,
    chunk: Vec<Route>,
    opts: EngineOptions,
    max_conn_per_host: usize,
    quarantine_threshold: i64,
    content_length_ignore_ranges: Vec<crate::route::Range>,
    success_status_codes: Vec<u16>,
    fail_status_codes: Vec<u16>,
    wildcard_detection: bool,
    delay: std::time::Duration,
    progress: Arc<dyn ProgressBar>,
    output: mpsc::Sender<ScanResult>,
    generic_client: Arc<GenericClient>,
) {
    for (i, route) in chunk.iter().enumerate() {
        if i % CHECK_INTERVAL == 0 && (target.is_cancelled() || target.is_quarantined()) {
            break;
        }

        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let request = Request::new(target.clone(), route);
        let response = do_client(&request, &opts, max_conn_per_host, &generic_client).await;
        progress.incr(1);
        target.incr_hits();

        if response.status_code == 0 {
            target.incr_non_match(quarantine_threshold);
            continue;
        }

        // Not all route paths carry a leading slash by the time they reach
        // here, but the ones that do shouldn't count it.
        let basepath_len = {
            let len = route.path.len();
            if route.path.starts_with('/') {
                (len - 1) as u64
            } else {
                len as u64
            }
        };
        let has_amzn_header = response
            .headers
            .as_ref()
            .map(|h| h.iter().any(|(k, _)| k.eq_ignore_ascii_case("x-amzn-requestid")))
            .unwrap_or(false);
        let view = ResponseView::from_response(&response, basepath_len, has_amzn_header);

        let baselines = target.baselines.lock().unwrap().clone();
        let known_bad = KnownBadSites;
        let wildcard = Wildcard {
            baselines: &baselines,
        };
        let length_range = ContentLengthRange {
            ranges: content_length_ignore_ranges.clone(),
        };
        let whitelist = StatusCodeWhitelist {
            codes: success_status_codes.clone(),
        };
        let blacklist = StatusCodeBlacklist {
            codes: fail_status_codes.clone(),
        };
        let mut validators: Vec<&dyn RequestValidator> = vec![&known_bad];
        if wildcard_detection {
            validators.push(&wildcard);
        }
        validators.push(&length_range);
        validators.push(&whitelist);
        validators.push(&blacklist);

        match validate_chain(&view, &validators) {
            Ok(()) => {
                target.reset_non_match();
                let result = ScanResult::new(&target, route.clone(), response);
                if output.send(result).await.is_err() {
                    break;
                }
            }
            Err(_) => {
                target.incr_non_match(quarantine_threshold);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Header, Method};

    fn route(path: &str) -> Route {
        Route {
            method: Method::Get,
            path: path.to_string(),
            query: String::new(),
            headers: Vec::<Header>::new(),
            body: Vec::new(),
            source_id: "src".to_string(),
        }
    }

    #[test]
    fn chunking_never_exceeds_configured_worker_count() {
        let routes: Vec<Route> = (0..25).map(|i| route(&format!("/r{i}"))).collect();
        let chunks = chunk_routes(&routes, 4);
        assert!(chunks.len() <= 4);
    }
}
