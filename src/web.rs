use actix_web::{middleware, web, App, HttpResponse, HttpServer, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CascadeError, StoreError};
use crate::schedule::{
    apply_plan, build_plan, detect_conflicts, AssignmentGrid, BunkId, CascadeOutcome, Claim,
    DivisionMap, LocationRegistry, ReservationTable, RotationHistory, ScheduleContext,
};
use crate::store::AssignmentStore;

/// Shared state for all handlers. Grids live in the store; everything else is read-only.
pub struct AppState {
    pub store: Arc<dyn AssignmentStore>,
    pub registry: LocationRegistry,
    pub divisions: DivisionMap,
    pub reservations: ReservationTable,
    pub config: Config,
}

#[derive(Deserialize)]
pub struct ConflictRequest {
    date: NaiveDate,
    location: String,
    slots: Vec<usize>,
    bunks: Vec<BunkId>,
    #[serde(default)]
    editable_divisions: Vec<String>,
}

#[derive(Deserialize)]
pub struct PlanRequest {
    date: NaiveDate,
    location: String,
    #[serde(default)]
    activity: Option<String>,
    slots: Vec<usize>,
    #[serde(default)]
    bunks: Vec<BunkId>,
    #[serde(default)]
    division: Option<String>,
    #[serde(default)]
    editable_divisions: Vec<String>,
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    #[serde(flatten)]
    plan: PlanRequest,
    version: u64,
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
pub struct PlanResponse {
    ok: bool,
    version: u64,
    outcome: CascadeOutcome,
}

#[derive(Serialize)]
pub struct ApplyResponse {
    ok: bool,
    version: u64,
    outcome: CascadeOutcome,
}

fn error_body(message: impl ToString) -> serde_json::Value {
    serde_json::json!({"ok": false, "error": message.to_string()})
}

fn error_response(err: &CascadeError) -> HttpResponse {
    match err {
        CascadeError::InvalidArgument(_) => HttpResponse::BadRequest().json(error_body(err)),
        CascadeError::StalePlan { .. } | CascadeError::Store(StoreError::StaleSnapshot { .. }) => {
            HttpResponse::Conflict().json(error_body(err))
        }
        CascadeError::Store(_) => {
            warn!(error = %err, "store failure");
            HttpResponse::InternalServerError().json(error_body(err))
        }
    }
}

impl PlanRequest {
    fn claim(&self, divisions: &DivisionMap) -> Result<Claim, CascadeError> {
        let activity = self.activity.clone().unwrap_or_else(|| self.location.clone());
        match &self.division {
            Some(division) => Claim::for_division(divisions, division, &self.location, activity, self.slots.clone()),
            None => Ok(Claim::new(&self.location, activity, self.slots.clone(), self.bunks.clone())),
        }
    }
}

fn plan_against(
    state: &AppState,
    request: &PlanRequest,
    grid: &AssignmentGrid,
    history: &RotationHistory,
) -> Result<(Claim, CascadeOutcome), CascadeError> {
    let claim = request.claim(&state.divisions)?;
    let editable = state.divisions.editable_bunks(request.editable_divisions.as_slice());
    let ctx = ScheduleContext::new(grid, &state.registry)
        .with_divisions(&state.divisions)
        .with_editable(&editable)
        .with_locks(&state.reservations)
        .with_history(history)
        .with_weights(&state.config.rotation);
    let outcome = build_plan(&ctx, &claim, &state.config.planner)?;
    Ok((claim, outcome))
}

fn history_for(state: &AppState, date: NaiveDate) -> Result<RotationHistory, CascadeError> {
    Ok(state.store.history(date, state.config.rotation.lookback_days)?)
}

// Stored grid for a day
async fn get_schedule(date: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let date = match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => return Ok(HttpResponse::BadRequest().json(error_body(format!("bad date {:?}", date.as_str())))),
    };
    match state.store.load(date) {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(snapshot)),
        Err(e) => Ok(error_response(&e.into())),
    }
}

async fn post_conflicts(req: web::Json<ConflictRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let snapshot = match state.store.load(req.date) {
        Ok(snapshot) => snapshot,
        Err(e) => return Ok(error_response(&e.into())),
    };
    let editable: BTreeSet<BunkId> = state.divisions.editable_bunks(req.editable_divisions.as_slice());
    let ctx = ScheduleContext::new(&snapshot.grid, &state.registry)
        .with_divisions(&state.divisions)
        .with_editable(&editable)
        .with_locks(&state.reservations);

    match detect_conflicts(&ctx, &req.location, &req.slots, &req.bunks) {
        Ok(report) => Ok(HttpResponse::Ok().json(report)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn post_plan(req: web::Json<PlanRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let result = state
        .store
        .load(req.date)
        .map_err(CascadeError::from)
        .and_then(|snapshot| {
            let history = history_for(&state, req.date)?;
            let (_, outcome) = plan_against(&state, &req, &snapshot.grid, &history)?;
            Ok(PlanResponse {
                ok: true,
                version: snapshot.version,
                outcome,
            })
        });
    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(error_response(&e)),
    }
}

// Re-plans against the caller's version, then applies and saves
async fn post_apply(req: web::Json<ApplyRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let date = req.plan.date;
    let mut snapshot = match state.store.load(date) {
        Ok(snapshot) => snapshot,
        Err(e) => return Ok(error_response(&e.into())),
    };
    if snapshot.version != req.version {
        let err = StoreError::StaleSnapshot {
            date: date.to_string(),
            expected: req.version,
            actual: snapshot.version,
        };
        return Ok(error_response(&err.into()));
    }

    let planned = history_for(&state, date)
        .and_then(|history| plan_against(&state, &req.plan, &snapshot.grid, &history));
    let (claim, outcome) = match planned {
        Ok(planned) => planned,
        Err(e) => return Ok(error_response(&e)),
    };

    if !outcome.reserved_slots.is_empty() || (!outcome.is_clean() && !req.force) {
        return Ok(HttpResponse::UnprocessableEntity().json(serde_json::json!({
            "ok": false,
            "error": "plan leaves conflicts unresolved",
            "outcome": outcome,
        })));
    }

    let saved = apply_plan(&mut snapshot.grid, &claim, &outcome)
        .and_then(|()| state.store.save(date, &snapshot.grid, snapshot.version).map_err(CascadeError::from));
    match saved {
        Ok(version) => {
            info!(%date, version, location = %claim.location, "claim applied");
            Ok(HttpResponse::Ok().json(ApplyResponse {
                ok: true,
                version,
                outcome,
            }))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/schedule/{date}").route(web::get().to(get_schedule)))
        .route("/api/conflicts", web::post().to(post_conflicts))
        .route("/api/plan", web::post().to(post_plan))
        .route("/api/apply", web::post().to(post_apply));
}

pub async fn start_server(state: AppState) -> std::io::Result<()> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let app_state = web::Data::new(state);

    info!(%host, port, "starting http server");
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
