//! # Attendance Portal Backend
//!
//! Everything behind the portal's HTTP surface.
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST API, change stream)
//!     ↓
//! Domain Layer (attendance marking, roster, reports, sign-in)
//!     ↓
//! Storage Layer (SQLite or in-memory, change feed, session store)
//! ```
//!
//! ## Key Responsibilities
//!
//! - Pick the storage backend named by the configuration
//! - Wire every service to the same storage and change feed
//! - Build the router with CORS and the optional static file fallback

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use shared::AuthUser;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{PortalConfig, ServerConfig, StorageBackend};
use crate::domain::{
    AttendanceScreen, AttendanceService, AuthService, Clock, LoggingDelivery, RequestService,
    RosterService, ScreenSettings, SummaryService, SystemClock,
};
use crate::storage::{
    seed, AttendanceRepository, AttendanceStorage, BroadcastChangeFeed, DbConnection,
    FileSessionStore, InMemoryStorage, MemorySessionStore, SessionStorage, StudentRepository,
    StudentStorage, SubjectRepository, SubjectStorage,
};

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub roster_service: RosterService,
    pub attendance_service: AttendanceService,
    pub summary_service: SummaryService,
    pub auth_service: AuthService,
    pub request_service: RequestService,
    pub change_feed: BroadcastChangeFeed,
    pub screen_settings: ScreenSettings,
}

impl AppState {
    /// A marking screen wired to this backend's storage and change feed
    pub fn attendance_screen(&self, user: AuthUser) -> AttendanceScreen {
        AttendanceScreen::new(
            self.attendance_service.clone(),
            Arc::new(self.change_feed.clone()),
            user,
            self.screen_settings,
        )
    }
}

/// Install the tracing subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &PortalConfig) -> Result<AppState> {
    initialize_backend_with_clock(config, Arc::new(SystemClock)).await
}

pub async fn initialize_backend_with_clock(
    config: &PortalConfig,
    clock: Arc<dyn Clock>,
) -> Result<AppState> {
    let change_feed = BroadcastChangeFeed::new();

    let students: Arc<dyn StudentStorage>;
    let subjects: Arc<dyn SubjectStorage>;
    let attendance: Arc<dyn AttendanceStorage>;
    match config.storage.backend {
        StorageBackend::Sqlite => {
            info!("Setting up database at {}", config.storage.database_url);
            let db = DbConnection::new(&config.storage.database_url)
                .await
                .with_context(|| format!("Failed to open {}", config.storage.database_url))?;
            students = Arc::new(StudentRepository::new(db.clone()));
            subjects = Arc::new(SubjectRepository::new(db.clone()));
            attendance = Arc::new(AttendanceRepository::new(db, change_feed.clone()));
        }
        StorageBackend::Memory => {
            info!("Setting up in-memory storage");
            let storage = InMemoryStorage::new(change_feed.clone());
            students = Arc::new(storage.clone());
            subjects = Arc::new(storage.clone());
            attendance = Arc::new(storage);
        }
    }

    if config.storage.seed_demo_data {
        seed::seed_demo_data(students.as_ref(), subjects.as_ref()).await?;
    }

    let session: Arc<dyn SessionStorage> = match &config.storage.session_file {
        Some(path) => {
            info!("Keeping sessions in {:?}", path);
            Arc::new(FileSessionStore::new(path.clone()))
        }
        None => Arc::new(MemorySessionStore::new()),
    };

    info!("Setting up domain model");
    let roster_service = RosterService::new(students.clone(), subjects.clone());
    let attendance_service = AttendanceService::new(
        students.clone(),
        attendance.clone(),
        clock,
        config.attendance.zero_present_policy,
    );
    let summary_service = SummaryService::new(students, subjects, attendance);
    let auth_service = AuthService::new(config.accounts.clone(), session);
    let request_service = RequestService::new(config.requests.clone(), Arc::new(LoggingDelivery));

    info!("Setting up application state");
    Ok(AppState {
        roster_service,
        attendance_service,
        summary_service,
        auth_service,
        request_service,
        change_feed,
        screen_settings: config.realtime.screen_settings(),
    })
}

/// Create the router with all API routes
pub fn create_router(app_state: AppState, server: &ServerConfig) -> Result<Router> {
    let origin = server
        .allowed_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid allowed origin: {}", server.allowed_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/students", get(io::list_students).post(io::create_student))
        .route(
            "/students/:id",
            get(io::get_student)
                .put(io::update_student)
                .delete(io::delete_student),
        )
        .route("/students/:id/attendance", get(io::get_student_attendance))
        .route("/reports/attendance", get(io::get_class_report))
        .route("/subjects", get(io::list_subjects).post(io::create_subject))
        .route(
            "/subjects/:id",
            put(io::update_subject).delete(io::delete_subject),
        )
        .route("/attendance", get(io::get_attendance).post(io::save_attendance))
        .route("/attendance/stats", get(io::get_attendance_stats))
        .route("/attendance/changes", get(io::stream_attendance_changes))
        .route("/auth/login", post(io::login))
        .route("/auth/logout", post(io::logout))
        .route("/auth/me", get(io::current_user))
        .route("/auth/subjects", get(io::my_subjects))
        .route("/requests", post(io::submit_request))
        .route("/logs", post(io::log_client_message));

    let mut router = Router::new().nest("/api", api_routes);
    if let Some(dir) = &server.static_dir {
        info!("Serving static files from {:?}", dir);
        router = router.fallback_service(ServeDir::new(dir));
    }

    Ok(router.layer(cors).with_state(app_state))
}
