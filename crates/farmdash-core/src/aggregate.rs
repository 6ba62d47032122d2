//! Dashboard aggregation: fans out to the per-entity fetchers, tolerates
//! branch failures, and falls back to the offline cache when the live
//! path is unavailable.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::DashboardSettings;
use crate::error::{
    record_error, AggregationError, AggregationErrorKind, DashboardError, GatewayError,
};
use crate::fetchers;
use crate::gateway::ApiGateway;
use crate::network::NetworkStatus;
use crate::offline::{dashboard_key, OfflineStore};
use crate::sync::SyncQueue;
use crate::types::{
    CommunityPost, Crop, DashboardViewModel, Farm, FarmOverview, PostQuery, UserStats,
    WeatherData,
};

/// Rejects empty ids and ids containing whitespace or control characters.
pub fn validate_user_id(user_id: &str) -> Result<&str, DashboardError> {
    let malformed = user_id.is_empty()
        || user_id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control());
    if malformed {
        return Err(DashboardError::InvalidUserId(user_id.to_string()));
    }
    Ok(user_id)
}

/// Drops farms whose id was already seen, keeping the first occurrence.
pub fn dedupe_farms(farms: Vec<Farm>) -> Vec<Farm> {
    let mut seen = HashSet::new();
    farms
        .into_iter()
        .filter(|farm| seen.insert(farm.id.clone()))
        .collect()
}

/// Attaches every crop to the farm its canonical reference names. Crops
/// seen twice are kept once; crops naming no fetched farm are left out.
pub fn merge_farms_and_crops(farms: Vec<Farm>, crops: Vec<Crop>) -> Vec<FarmOverview> {
    let mut overviews: Vec<FarmOverview> = farms
        .into_iter()
        .map(|farm| FarmOverview {
            farm,
            crops: Vec::new(),
        })
        .collect();
    let index: HashMap<String, usize> = overviews
        .iter()
        .enumerate()
        .map(|(i, overview)| (overview.farm.id.clone(), i))
        .collect();

    let mut seen = HashSet::new();
    for crop in crops {
        if !seen.insert(crop.id.clone()) {
            continue;
        }
        match crop.farm_id.as_deref().and_then(|id| index.get(id)) {
            Some(&i) => overviews[i].crops.push(crop),
            None => debug!(crop_id = %crop.id, farm_id = ?crop.farm_id, "crop matches no fetched farm"),
        }
    }
    overviews
}

pub fn compute_stats(farms: &[Farm], crops: &[Crop]) -> UserStats {
    let crop_types: BTreeSet<&str> = crops
        .iter()
        .map(|crop| crop.name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    UserStats {
        farm_count: farms.len(),
        total_area: farms.iter().map(|farm| farm.size).sum(),
        crop_types: crop_types.len(),
    }
}

/// Newest farms first; undated farms sort last in fetch order.
pub fn recent_farms(farms: &[Farm], limit: usize) -> Vec<Farm> {
    let mut sorted = farms.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}

struct FarmFetch {
    farms: Vec<Farm>,
    crops: Vec<Crop>,
    crop_failures: Vec<(String, GatewayError)>,
}

struct LiveData {
    farms: Vec<Farm>,
    crops: Vec<Crop>,
    weather: Vec<WeatherData>,
    posts: Vec<CommunityPost>,
    error: Option<AggregationError>,
}

pub struct DashboardAggregator {
    gateway: Arc<dyn ApiGateway>,
    store: Arc<dyn OfflineStore>,
    network: Arc<dyn NetworkStatus>,
    sync_queue: Option<Arc<SyncQueue>>,
    settings: DashboardSettings,
    issued: AtomicU64,
    /// Per-user cache slot holding the sequence number last written.
    cache_slots: Mutex<HashMap<String, Arc<futures::lock::Mutex<u64>>>>,
}

impl DashboardAggregator {
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        store: Arc<dyn OfflineStore>,
        network: Arc<dyn NetworkStatus>,
    ) -> Self {
        Self {
            gateway,
            store,
            network,
            sync_queue: None,
            settings: DashboardSettings::default(),
            issued: AtomicU64::new(0),
            cache_slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_settings(mut self, settings: DashboardSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sync_queue(mut self, queue: Arc<SyncQueue>) -> Self {
        self.sync_queue = Some(queue);
        self
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn gateway(&self) -> &dyn ApiGateway {
        self.gateway.as_ref()
    }

    /// Builds the dashboard for `user_id`. Only a malformed id is an error;
    /// every other failure lands in the view model's error slot.
    pub async fn load_dashboard(&self, user_id: &str) -> Result<DashboardViewModel, DashboardError> {
        let user_id = validate_user_id(user_id)?;
        let sequence = self.next_sequence();
        Ok(self.assemble(user_id, sequence, None).await)
    }

    /// Like [`load_dashboard`](Self::load_dashboard), after a best-effort
    /// push of queued offline changes.
    pub async fn refresh_dashboard(
        &self,
        user_id: &str,
    ) -> Result<DashboardViewModel, DashboardError> {
        let user_id = validate_user_id(user_id)?;
        let sequence = self.next_sequence();
        let sync_error = self.push_pending_changes(user_id).await;
        Ok(self.assemble(user_id, sequence, sync_error).await)
    }

    /// Orders cache writes by when the load was requested.
    fn next_sequence(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn push_pending_changes(&self, user_id: &str) -> Option<AggregationError> {
        let queue = self.sync_queue.as_ref()?;
        if queue.user_id() != user_id {
            debug!(
                user_id,
                queue_owner = queue.user_id(),
                "pending changes belong to another user, not pushing"
            );
            return None;
        }
        if queue.is_empty() {
            return None;
        }
        if !self.network.is_online() {
            debug!(pending = queue.len(), "offline, leaving pending changes queued");
            return None;
        }

        let report = queue.push(self.gateway.as_ref()).await;
        if let Err(err) = queue.persist(self.store.as_ref()).await {
            warn!(user_id = queue.user_id(), error = %err, "failed to persist sync queue");
        }
        report
            .error
            .map(|err| AggregationError::from_gateway(AggregationErrorKind::SyncFailure, &err))
    }

    async fn assemble(
        &self,
        user_id: &str,
        sequence: u64,
        carried: Option<AggregationError>,
    ) -> DashboardViewModel {
        if !self.network.is_online() {
            info!(user_id, "offline, serving cached dashboard");
            return match self.load_cached(user_id).await {
                Some(mut cached) => {
                    cached.is_offline = true;
                    if let Some(err) = carried {
                        record_error(&mut cached.error, err);
                    }
                    cached
                }
                None => {
                    let mut error = Some(AggregationError::new(
                        AggregationErrorKind::NetworkUnreachable,
                        "offline and no cached dashboard is available",
                    ));
                    if let Some(err) = carried {
                        record_error(&mut error, err);
                    }
                    self.empty_fallback(error)
                }
            };
        }

        match self.fetch_live().await {
            Ok(live) => {
                let mut error = live.error.clone();
                if let Some(err) = carried {
                    record_error(&mut error, err);
                }
                let view = self.build_view(live, error);
                info!(
                    user_id,
                    farms = view.stats.farm_count,
                    crops = view.crop_count(),
                    posts = view.posts.len(),
                    "dashboard assembled from live data"
                );
                self.write_cache(user_id, sequence, &view).await;
                view
            }
            Err(failure) => {
                warn!(user_id, error = %failure, "live dashboard fetch failed, falling back to cache");
                let mut error = Some(failure);
                if let Some(err) = carried {
                    record_error(&mut error, err);
                }
                match self.load_cached(user_id).await {
                    Some(mut cached) => {
                        cached.is_offline = true;
                        cached.error = error;
                        cached
                    }
                    None => self.empty_fallback(error),
                }
            }
        }
    }

    fn empty_fallback(&self, error: Option<AggregationError>) -> DashboardViewModel {
        DashboardViewModel {
            is_offline: true,
            pending_changes: self.network.pending_changes(),
            error,
            ..DashboardViewModel::empty()
        }
    }

    async fn fetch_live(&self) -> Result<LiveData, AggregationError> {
        let gateway = self.gateway.as_ref();
        let limit = u32::try_from(self.settings.posts_page_size).unwrap_or(u32::MAX);
        let query = PostQuery::first_page(limit);
        let location = self.settings.weather_location.as_deref();

        let (farms, weather, posts) = futures::join!(
            self.fetch_farms_with_crops(),
            fetchers::fetch_weather(gateway, location),
            fetchers::fetch_posts(gateway, &query),
        );

        let fetched = match farms {
            Ok(fetched) => fetched,
            Err(err) => {
                let kind = if weather.is_ok() || posts.is_ok() {
                    AggregationErrorKind::PartialFarmFailure
                } else {
                    AggregationErrorKind::NetworkUnreachable
                };
                return Err(AggregationError::from_gateway(kind, &err));
            }
        };

        let mut error = None;
        if let Some(crop_error) = summarize_crop_failures(&fetched.crop_failures) {
            record_error(&mut error, crop_error);
        }
        let weather = settle_branch("weather", weather, &mut error);
        let posts = settle_branch("posts", posts, &mut error);

        Ok(LiveData {
            farms: fetched.farms,
            crops: fetched.crops,
            weather,
            posts,
            error,
        })
    }

    async fn fetch_farms_with_crops(&self) -> Result<FarmFetch, GatewayError> {
        let gateway = self.gateway.as_ref();
        let farms = dedupe_farms(fetchers::fetch_farms(gateway).await?);

        let branches = join_all(farms.iter().map(|farm| async move {
            let result = fetchers::fetch_crops(gateway, Some(farm.id.as_str())).await;
            (farm.id.as_str(), result)
        }))
        .await;

        let mut crops = Vec::new();
        let mut crop_failures = Vec::new();
        for (farm_id, result) in branches {
            match result {
                Ok(found) => crops.extend(found),
                Err(err) => {
                    warn!(farm_id, error = %err, "crop fetch failed, farm kept without crops");
                    crop_failures.push((farm_id.to_string(), err));
                }
            }
        }

        Ok(FarmFetch {
            farms,
            crops,
            crop_failures,
        })
    }

    fn build_view(&self, live: LiveData, error: Option<AggregationError>) -> DashboardViewModel {
        let stats = compute_stats(&live.farms, &live.crops);
        let recent = recent_farms(&live.farms, self.settings.recent_farms_limit);
        DashboardViewModel {
            stats,
            farms: merge_farms_and_crops(live.farms, live.crops),
            recent_farms: recent,
            weather: live.weather,
            posts: live.posts,
            updated_at: Some(Utc::now()),
            is_offline: false,
            pending_changes: self.network.pending_changes(),
            error,
        }
    }

    async fn load_cached(&self, user_id: &str) -> Option<DashboardViewModel> {
        match self.store.get_offline_data(&dashboard_key(user_id)).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(view) => Some(view),
                Err(err) => {
                    warn!(user_id, error = %err, "cached dashboard is unreadable, ignoring it");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(user_id, error = %err, "failed to read cached dashboard");
                None
            }
        }
    }

    fn cache_slot(&self, user_id: &str) -> Arc<futures::lock::Mutex<u64>> {
        let mut slots = self
            .cache_slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(futures::lock::Mutex::new(0)))
            .clone()
    }

    /// Write-through of a live result. Writes for one user never
    /// interleave, and a result older than the cached one is not written.
    async fn write_cache(&self, user_id: &str, sequence: u64, view: &DashboardViewModel) {
        let slot = self.cache_slot(user_id);
        let mut last_written = slot.lock().await;
        if *last_written > sequence {
            debug!(user_id, sequence, "newer dashboard already cached, skipping write");
            return;
        }

        let value = match serde_json::to_value(view) {
            Ok(value) => value,
            Err(err) => {
                warn!(user_id, error = %err, "failed to encode dashboard for caching");
                return;
            }
        };
        match self.store.set_offline_data(&dashboard_key(user_id), value).await {
            Ok(()) => *last_written = sequence,
            Err(err) => warn!(user_id, error = %err, "failed to cache dashboard"),
        }
    }
}

fn summarize_crop_failures(failures: &[(String, GatewayError)]) -> Option<AggregationError> {
    if let Some((_, err)) = failures.iter().find(|(_, err)| err.is_auth()) {
        return Some(AggregationError::new(
            AggregationErrorKind::AuthFailure,
            err.to_string(),
        ));
    }
    let (_, first) = failures.first()?;
    let farm_ids: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
    Some(AggregationError::new(
        AggregationErrorKind::PartialCropFailure,
        format!("crops unavailable for farms [{}]: {first}", farm_ids.join(", ")),
    ))
}

/// Secondary branches degrade to empty. Only auth failures reach the
/// error slot; anything else is logged.
fn settle_branch<T>(
    branch: &'static str,
    result: Result<Vec<T>, GatewayError>,
    error: &mut Option<AggregationError>,
) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(err) => {
            warn!(branch, error = %err, "dashboard branch failed, using empty result");
            if err.is_auth() {
                record_error(
                    error,
                    AggregationError::new(AggregationErrorKind::AuthFailure, err.to_string()),
                );
            }
            Vec::new()
        }
    }
}
