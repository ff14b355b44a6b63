//! Application wiring for the convene CLI.
//!
//! `App` owns the configuration, session, API client and cache, and runs one
//! command against them. Reads go through the TTL cache so a failed request
//! falls back to the last copy on disk.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use convene_core::api::ApiError;
use convene_core::auth::SessionData;
use convene_core::cache::{
    announcements_key, cache_key, events_key, favorites_key, FileStorage, MemoryStorage, Storage,
};
use convene_core::models::{
    announcement, ticket_id_from_scan, Announcement, Event, FavoriteEvent, NewAnnouncement,
};
use convene_core::offline::OfflineFilter;
use convene_core::{
    ApiClient, CacheOptions, Config, EventFilters, EventPage, Fetched, OfflineCache,
    OfflineEventStore, OfflineFavorites, Session,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cli::{
    CacheCommand, Cli, Command, EventsArgs, FavoriteCommand, OfflineCommand, ProfileArgs,
};
use crate::render;

/// Page size used when pulling the whole schedule for offline sync.
const SYNC_PAGE_SIZE: u32 = 100;

const OFFLINE_MESSAGE: &str = "offline mode: server not contacted";

pub struct App {
    config: Config,
    session: Session,
    api: ApiClient,
    storage: Arc<dyn Storage>,
    cache: OfflineCache<Arc<dyn Storage>>,
    offline: bool,
}

impl App {
    pub fn new(cli: &Cli) -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        if let Some(ref url) = cli.api_url {
            config.api_url = Some(url.clone());
        }

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");

        let mut session = Session::in_dir(cache_dir.clone());
        let load_result = session.load();
        debug!(?load_result, has_data = session.data.is_some(), "Session loaded");

        let mut api = ApiClient::from_config(&config)?;
        if let Some(token) = session.token() {
            api.set_token(token.to_string());
        }

        let storage: Arc<dyn Storage> = if cli.no_persist {
            Arc::new(MemoryStorage::new())
        } else {
            Arc::new(FileStorage::new(cache_dir.join("data")))
        };

        Ok(Self::with_parts(config, session, api, storage, cli.offline))
    }

    pub fn with_parts(
        config: Config,
        session: Session,
        api: ApiClient,
        storage: Arc<dyn Storage>,
        offline: bool,
    ) -> Self {
        Self {
            config,
            session,
            api,
            cache: OfflineCache::new(storage.clone()),
            storage,
            offline,
        }
    }

    fn ttl(&self) -> Duration {
        self.config.cache_ttl()
    }

    fn offline_store(&self) -> OfflineEventStore<Arc<dyn Storage>> {
        OfflineEventStore::new(self.storage.clone())
    }

    fn offline_favorites(&self) -> OfflineFavorites<Arc<dyn Storage>> {
        OfflineFavorites::new(self.storage.clone())
    }

    fn require_login(&self) -> Result<()> {
        if self.session.token().is_none() {
            bail!("Not signed in. Run `convene login` first.");
        }
        Ok(())
    }

    fn require_online(&self) -> Result<()> {
        if self.offline {
            bail!("This command needs the server; drop --offline to run it.");
        }
        Ok(())
    }

    /// Read through the cache. In offline mode the fetch fails immediately so
    /// only cached data (fresh or stale) or the fallback is served.
    async fn cached<T, F, Fut>(&self, options: CacheOptions<T>, force: bool, fetch: F) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let offline = self.offline;
        self.cache
            .fetch_with(
                options,
                || async move {
                    if offline {
                        bail!(OFFLINE_MESSAGE);
                    }
                    fetch().await
                },
                force,
            )
            .await
    }

    // ===== Reads =====

    /// One page of events. With nothing cached and the server unreachable,
    /// the filters are applied to the offline event store instead.
    pub async fn events(&self, filters: &EventFilters, force: bool) -> Result<Fetched<EventPage>> {
        let mut options = CacheOptions::new(events_key(filters)).ttl(self.ttl());

        let stored: Vec<Event> = self.offline_store().load().events.into_iter().map(|e| e.event).collect();
        if !stored.is_empty() {
            options = options.fallback(filters.apply(&stored)?);
        }

        let api = &self.api;
        self.cached(options, force, || api.fetch_events(filters)).await
    }

    pub async fn event(&self, id: &str, force: bool) -> Result<Fetched<Event>> {
        let mut options = CacheOptions::new(cache_key(&format!("event_{}", id))).ttl(self.ttl());
        if let Some(stored) = self.offline_store().load().events.into_iter().find(|e| e.event.id == id) {
            options = options.fallback(stored.event);
        }

        let api = &self.api;
        self.cached(options, force, || api.fetch_event(id)).await
    }

    pub async fn announcements(&self, force: bool) -> Result<Fetched<Vec<Announcement>>> {
        let api = &self.api;
        let mut fetched = self
            .cached(CacheOptions::new(announcements_key()).ttl(self.ttl()), force, || {
                api.fetch_announcements()
            })
            .await?;
        announcement::sort_for_display(&mut fetched.data);
        Ok(fetched)
    }

    pub async fn favorites(&self, force: bool) -> Result<Fetched<Vec<FavoriteEvent>>> {
        self.require_login()?;
        let api = &self.api;
        self.cached(CacheOptions::new(favorites_key()).ttl(self.ttl()), force, || api.fetch_favorites())
            .await
    }

    /// Every event on the server, following pagination.
    async fn fetch_all_events(api: &ApiClient) -> Result<Vec<Event>> {
        let mut filters = EventFilters::new().with_limit(SYNC_PAGE_SIZE);
        let mut events = Vec::new();
        loop {
            let page = api.fetch_events(&filters).await?;
            events.extend(page.events);
            if !page.pagination.has_next {
                break;
            }
            filters = filters.next_page();
        }
        Ok(events)
    }

    // ===== Commands =====

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Events(args) => self.cmd_events(&args).await,
            Command::Event { id, refresh } => {
                let fetched = self.event(&id, refresh).await?;
                print!("{}", render::event_detail(&fetched.data));
                self.print_freshness(&fetched);
                Ok(())
            }
            Command::FilterOptions => {
                let api = &self.api;
                let options = CacheOptions::new(cache_key("filter_options")).ttl(self.ttl());
                let fetched = self.cached(options, false, || api.fetch_filter_options()).await?;
                let (categories, locations) = &fetched.data;
                println!("Categories:");
                print!("{}", render::string_list(categories, "  (none)"));
                println!("Locations:");
                print!("{}", render::string_list(locations, "  (none)"));
                self.print_freshness(&fetched);
                Ok(())
            }
            Command::Announcements { refresh } => {
                let fetched = self.announcements(refresh).await?;
                print!("{}", render::announcements(&fetched.data));
                self.print_freshness(&fetched);
                Ok(())
            }
            Command::Announce { title, content, priority } => {
                self.require_online()?;
                let created = self
                    .api
                    .create_announcement(&NewAnnouncement { title, content, priority })
                    .await?;
                if let Err(e) = self.cache.clear(&announcements_key()) {
                    warn!(error = %e, "Failed to drop cached announcements");
                }
                println!("Posted \"{}\" ({}).", created.title, created.id);
                Ok(())
            }
            Command::Favorites { refresh } => {
                let fetched = self.favorites(refresh).await?;
                print!("{}", render::favorites(&fetched.data));
                self.print_freshness(&fetched);
                Ok(())
            }
            Command::Favorite(cmd) => self.cmd_favorite(cmd).await,
            Command::Checkin { code } => {
                self.require_online()?;
                self.require_login()?;
                let ticket_id = ticket_id_from_scan(&code)
                    .ok_or_else(|| anyhow::anyhow!("Scanned code does not contain a ticket id"))?;
                let resp = self.api.check_in(&ticket_id).await?;
                println!("{} ({})", resp.message, resp.ticket.id);
                Ok(())
            }
            Command::PushToken { token, platform } => {
                self.require_online()?;
                self.require_login()?;
                let resp = self.api.register_push_token(&token, &platform).await?;
                println!("{}", resp.message);
                Ok(())
            }
            Command::Login { email } => self.cmd_login(email).await,
            Command::Logout => {
                self.session.clear()?;
                self.api.clear_token();
                self.cache.clear(&favorites_key())?;
                println!("Signed out.");
                Ok(())
            }
            Command::Whoami => {
                self.require_online()?;
                self.require_login()?;
                let resp = self.api.verify_token().await?;
                println!("{} <{}>", resp.user.name, resp.user.email);
                Ok(())
            }
            Command::Profile(args) => self.cmd_profile(&args).await,
            Command::Offline(cmd) => self.cmd_offline(cmd).await,
            Command::Cache(cmd) => self.cmd_cache(cmd),
        }
    }

    fn print_freshness<T>(&self, fetched: &Fetched<T>) {
        eprintln!("\n{}", render::freshness(fetched.source, fetched.last_updated, Utc::now()));
    }

    async fn cmd_events(&self, args: &EventsArgs) -> Result<()> {
        let filters = args.to_filters()?;
        let fetched = self.events(&filters, args.refresh).await?;
        print!("{}", render::event_page(&fetched.data));
        self.print_freshness(&fetched);
        Ok(())
    }

    async fn cmd_favorite(&self, cmd: FavoriteCommand) -> Result<()> {
        let local = self.offline_favorites();
        match cmd {
            FavoriteCommand::Add { event_id } => {
                local.add(&event_id)?;
                if self.offline {
                    println!("Saved offline; it will not reach the server until you add it again online.");
                    return Ok(());
                }
                self.require_login()?;
                match self.api.add_favorite(&event_id).await {
                    Ok(resp) => println!("{}", resp.message),
                    // already favorited on the server
                    Err(e) if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::Validation { .. })) => {
                        println!("Already in favorites.")
                    }
                    Err(e) => return Err(e),
                }
                self.cache.clear(&favorites_key())?;
            }
            FavoriteCommand::Remove { event_id } => {
                local.remove(&event_id)?;
                if self.offline {
                    println!("Removed offline.");
                    return Ok(());
                }
                self.require_login()?;
                let resp = self.api.remove_favorite(&event_id).await?;
                println!("{}", resp.message);
                self.cache.clear(&favorites_key())?;
            }
            FavoriteCommand::Check { event_id } => {
                let is_favorite = if self.offline || self.session.token().is_none() {
                    local.contains(&event_id)
                } else {
                    self.api.check_favorite(&event_id).await?.is_favorited
                };
                println!("{}", if is_favorite { "yes" } else { "no" });
            }
        }
        Ok(())
    }

    async fn cmd_login(&mut self, email: Option<String>) -> Result<()> {
        self.require_online()?;

        let email = match email {
            Some(e) => e,
            None => Self::prompt_email(self.config.last_email.as_deref())?,
        };
        let password = rpassword::prompt_password("Password: ")?;

        let auth = match self.api.login(&email, &password).await {
            Ok(auth) => auth,
            Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth_error) => {
                bail!("Sign in failed: {}", e);
            }
            Err(e) => return Err(e),
        };

        self.session.update(SessionData::from_auth(auth));
        self.session.save().context("Failed to save session")?;
        if let Some(token) = self.session.token() {
            self.api.set_token(token.to_string());
        }

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        let name = self.session.user().map(|u| u.name.clone()).unwrap_or_default();
        info!("Signed in");
        println!("Signed in as {}.", name);
        Ok(())
    }

    fn prompt_email(last: Option<&str>) -> Result<String> {
        match last {
            Some(last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        match (input.is_empty(), last) {
            (true, Some(last)) => Ok(last.to_string()),
            (true, None) => bail!("Email is required"),
            (false, _) => Ok(input.to_string()),
        }
    }

    async fn cmd_profile(&mut self, args: &ProfileArgs) -> Result<()> {
        self.require_online()?;
        self.require_login()?;

        let update = args.to_update();
        let profile = if update.is_empty() {
            self.api.fetch_profile().await?
        } else {
            let profile = self.api.update_profile(&update).await?;
            if let Some(data) = self.session.data.as_mut() {
                data.user = (&profile).into();
                if let Err(e) = self.session.save() {
                    warn!(error = %e, "Failed to save session");
                }
            }
            info!("Profile updated");
            profile
        };

        print!("{}", render::profile(&profile));
        Ok(())
    }

    async fn cmd_offline(&self, cmd: OfflineCommand) -> Result<()> {
        let mut store = self.offline_store();
        match cmd {
            OfflineCommand::Pin { event_id } => {
                let fetched = self.event(&event_id, false).await?;
                let title = fetched.data.title.clone();
                store.add_event(fetched.data)?;
                store.mark_for_offline(&event_id)?;
                println!("Pinned \"{}\" for offline use.", title);
            }
            OfflineCommand::Unpin { event_id } => {
                if store.remove_event(&event_id)? {
                    println!("Removed.");
                } else {
                    println!("Not stored offline.");
                }
            }
            OfflineCommand::List { search, category, location, pinned } => {
                let filter = OfflineFilter {
                    search,
                    category,
                    location,
                    offline_only: pinned,
                };
                print!("{}", render::offline_events(&store.events(&filter)));
            }
            OfflineCommand::Sync => {
                self.require_online()?;
                let api = &self.api;
                store.sync(|| Self::fetch_all_events(api)).await?;
                print!("{}", render::offline_stats(&store.stats(), Utc::now()));
            }
            OfflineCommand::Stats => {
                print!("{}", render::offline_stats(&store.stats(), Utc::now()));
            }
            OfflineCommand::Clear => {
                store.clear()?;
                self.offline_favorites().clear()?;
                println!("Offline events cleared.");
            }
        }
        Ok(())
    }

    fn cmd_cache(&self, cmd: CacheCommand) -> Result<()> {
        match cmd {
            CacheCommand::Stats => {
                print!("{}", render::cache_stats(&self.cache.entries(), self.cache.storage_size()));
            }
            CacheCommand::Clear => {
                let removed = self.cache.clear_all()?;
                println!("Removed {} cached entries.", removed);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use convene_core::cache::DataSource;
    use convene_core::models::{EventCategory, Priority};

    use super::*;

    fn event(id: &str, title: &str, category: &str) -> Event {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "title": title,
            "date": "2026-05-02T14:00:00Z",
            "location": "Room 4",
            "category": category,
        }))
        .unwrap()
    }

    /// App over an in-memory store pointing at a port nothing listens on.
    fn app(offline: bool) -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let api = ApiClient::new("http://127.0.0.1:9/api", Duration::from_secs(2)).unwrap();
        let session = Session::in_dir(dir.path().to_path_buf());
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        (App::with_parts(Config::default(), session, api, storage, offline), dir)
    }

    #[tokio::test]
    async fn test_offline_serves_stale_cache() {
        let (app, _dir) = app(true);
        let filters = EventFilters::default();
        let page = EventPage::unpaged(vec![event("e1", "Rust Workshop", "workshop")]);
        app.cache.save(&events_key(&filters), &page, Duration::ZERO).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let fetched = app.events(&filters, false).await.unwrap();
        assert_eq!(fetched.source, DataSource::StaleCache);
        assert_eq!(fetched.data.events.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_pinned_events() {
        let (app, _dir) = app(true);
        let store = app.offline_store();
        store.add_event(event("e1", "Rust Workshop", "workshop")).unwrap();
        store.add_event(event("e2", "Keynote", "keynote")).unwrap();

        let filters = EventFilters::new().with_category(EventCategory::Workshop.as_str());
        let fetched = app.events(&filters, false).await.unwrap();

        assert_eq!(fetched.source, DataSource::Fallback);
        assert_eq!(fetched.data.events.len(), 1);
        assert_eq!(fetched.data.events[0].id, "e1");
        assert_eq!(fetched.data.pagination.total_events, 1);
    }

    #[tokio::test]
    async fn test_offline_with_nothing_cached_is_an_error() {
        let (app, _dir) = app(true);
        let err = app.announcements(false).await.unwrap_err();
        assert!(err.to_string().contains("offline mode"));
    }

    #[tokio::test]
    async fn test_announcements_sorted_from_cache() {
        let (app, _dir) = app(true);
        let items: Vec<Announcement> = serde_json::from_value(serde_json::json!([
            {"_id": "a1", "title": "Lunch", "priority": "low"},
            {"_id": "a2", "title": "Fire drill", "priority": "high"}
        ]))
        .unwrap();
        app.cache.save(&announcements_key(), &items, Duration::from_secs(60)).unwrap();

        let fetched = app.announcements(false).await.unwrap();
        assert_eq!(fetched.source, DataSource::Cache);
        assert_eq!(fetched.data[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_favorites_require_login() {
        let (app, _dir) = app(true);
        let err = app.favorites(false).await.unwrap_err();
        assert!(err.to_string().contains("Not signed in"));
    }

    #[tokio::test]
    async fn test_offline_favorite_add_is_local() {
        let (app, _dir) = app(true);
        app.cmd_favorite(FavoriteCommand::Add { event_id: "e1".to_string() }).await.unwrap();
        assert!(app.offline_favorites().contains("e1"));
    }

    #[tokio::test]
    async fn test_unreachable_server_with_nothing_cached_propagates() {
        let (app, _dir) = app(false);
        let err = app.event("e1", false).await.unwrap_err();
        assert!(err.downcast_ref::<ApiError>().is_some());
    }
}
