use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    BandAmounts, EqualSplit, LossContext, SolveConfig, SolveResult, equal_split, solve,
};

pub const DEFAULT_PORT: u16 = 8080;

pub struct ApiState {
    ctx: LossContext,
    config: SolveConfig,
    policy: OnceLock<Result<PolicyResponse, String>>,
}

impl ApiState {
    pub fn new(ctx: LossContext, config: SolveConfig) -> Self {
        Self {
            ctx,
            config,
            policy: OnceLock::new(),
        }
    }

    fn policy(&self) -> Result<PolicyResponse, String> {
        self.policy
            .get_or_init(|| {
                let result = solve(&self.ctx, &self.config).map_err(|err| err.to_string())?;
                Ok(PolicyResponse {
                    result,
                    equal_split: equal_split(&self.ctx),
                })
            })
            .clone()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyResponse {
    #[serde(flatten)]
    result: SolveResult,
    equal_split: EqualSplit,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LossPayload {
    young_child: Option<f64>,
    older_child: Option<f64>,
    young_adult: Option<f64>,
    adult: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LossResponse {
    amounts: BandAmounts,
    senior_amount: f64,
    loss: f64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/policy", get(policy_handler))
        .route("/api/loss", get(loss_get_handler).post(loss_post_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, state: Arc<ApiState>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "blank slate UBI API listening");
    println!("Blank slate UBI API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/health");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn policy_handler(State(state): State<Arc<ApiState>>) -> Response {
    match tokio::task::spawn_blocking(move || state.policy()).await {
        Ok(Ok(policy)) => json_response(StatusCode::OK, policy),
        Ok(Err(msg)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &msg),
        Err(err) => {
            error!(error = %err, "solve task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Solve task failed")
        }
    }
}

async fn loss_get_handler(
    State(state): State<Arc<ApiState>>,
    Query(payload): Query<LossPayload>,
) -> Response {
    loss_handler_impl(&state, payload)
}

async fn loss_post_handler(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<LossPayload>,
) -> Response {
    loss_handler_impl(&state, payload)
}

fn loss_handler_impl(state: &ApiState, payload: LossPayload) -> Response {
    let searched = match searched_from_payload(&payload) {
        Ok(searched) => searched,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let amounts = state.ctx.expand(&searched);
    let loss = state.ctx.loss_for_amounts(&amounts);
    json_response(
        StatusCode::OK,
        LossResponse {
            amounts,
            senior_amount: amounts.senior(),
            loss,
        },
    )
}

fn searched_from_payload(payload: &LossPayload) -> Result<[f64; 4], String> {
    let fields = [
        ("youngChild", payload.young_child),
        ("olderChild", payload.older_child),
        ("youngAdult", payload.young_adult),
        ("adult", payload.adult),
    ];
    let mut searched = [0.0; 4];
    for (slot, (name, value)) in searched.iter_mut().zip(fields) {
        let value = value.ok_or_else(|| format!("{name} is required"))?;
        if !value.is_finite() {
            return Err(format!("{name} must be a finite number"));
        }
        *slot = value;
    }
    Ok(searched)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn loss_payload_from_json(json: &str) -> Result<LossPayload, String> {
    serde_json::from_str::<LossPayload>(json).map_err(|e| format!("Invalid API JSON payload: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EvolutionConfig, LossOptions, UnitRecord, UnitTable};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn unit(baseline: f64, funded: f64, adults: u32, seniors: u32) -> UnitRecord {
        UnitRecord {
            baseline_net_income: baseline,
            funded_net_income: funded,
            count_young_child: 0,
            count_older_child: 0,
            count_young_adult: 0,
            count_adult: adults,
            count_senior: seniors,
            count_person: adults + seniors,
            weight: 1.0,
        }
    }

    fn sample_state() -> ApiState {
        let table = UnitTable::new(vec![
            unit(30_000.0, 24_000.0, 1, 0),
            unit(20_000.0, 16_000.0, 0, 1),
        ])
        .expect("valid table");
        let ctx = LossContext::new(table, LossOptions::default()).expect("valid context");
        let config = SolveConfig {
            evolution: EvolutionConfig {
                max_generations: 5,
                seed: Some(7),
                ..EvolutionConfig::default()
            },
            ..SolveConfig::with_upper_bound(10_000.0)
        };
        ApiState::new(ctx, config)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("body is json")
    }

    #[test]
    fn loss_payload_parses_camel_case_keys() {
        let payload = loss_payload_from_json(
            r#"{"youngChild": 100, "olderChild": 200, "youngAdult": 300, "adult": 400}"#,
        )
        .expect("json should parse");
        assert_eq!(
            searched_from_payload(&payload).expect("complete payload"),
            [100.0, 200.0, 300.0, 400.0]
        );
    }

    #[test]
    fn loss_payload_requires_every_searched_band() {
        let payload = loss_payload_from_json(r#"{"youngChild": 1, "olderChild": 2, "adult": 4}"#)
            .expect("json should parse");
        let err = searched_from_payload(&payload).expect_err("youngAdult missing");
        assert_eq!(err, "youngAdult is required");
    }

    #[tokio::test]
    async fn balanced_request_reports_zero_loss() {
        let state = sample_state();
        let payload = LossPayload {
            young_child: Some(0.0),
            older_child: Some(0.0),
            young_adult: Some(0.0),
            adult: Some(6_000.0),
        };
        let response = loss_handler_impl(&state, payload);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
        let body = body_json(response).await;
        assert_approx(body["seniorAmount"].as_f64().expect("number"), 4_000.0);
        assert_approx(body["loss"].as_f64().expect("number"), 0.0);
    }

    #[tokio::test]
    async fn starving_seniors_shows_up_in_loss() {
        let state = sample_state();
        let payload = LossPayload {
            young_child: Some(0.0),
            older_child: Some(0.0),
            young_adult: Some(0.0),
            adult: Some(10_000.0),
        };
        let body = body_json(loss_handler_impl(&state, payload)).await;
        assert_approx(body["seniorAmount"].as_f64().expect("number"), 0.0);
        // Senior unit loses 4000 of 20000; averaged over two persons.
        assert_approx(body["loss"].as_f64().expect("number"), 0.1);
    }

    #[tokio::test]
    async fn incomplete_request_is_rejected_as_json() {
        let state = sample_state();
        let response = loss_handler_impl(&state, LossPayload::default());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "youngChild is required");
    }

    #[tokio::test]
    async fn policy_endpoint_solves_once_and_includes_equal_split() {
        let state = Arc::new(sample_state());
        let first = body_json(policy_handler(State(state.clone())).await).await;
        let second = body_json(policy_handler(State(state)).await).await;
        assert_eq!(first, second);
        assert!(first["amounts"].is_array());
        assert_approx(first["equalSplit"]["amount"].as_f64().expect("number"), 5_000.0);
        assert!(first["message"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Not found");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let body = body_json(health_handler().await).await;
        assert_eq!(body["status"], "ok");
    }
}
