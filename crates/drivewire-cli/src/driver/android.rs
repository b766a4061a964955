//! Commands understood by the Android accessibility driver.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use drivewire_core::args;
use drivewire_core::error::{DriverError, Result};
use drivewire_core::geometry::{Algorithm, Point, Rect, Region};
use drivewire_core::policy::{RetryOverrides, RetryPolicy};
use drivewire_core::probe::{self, Probe};
use serde::Serialize;
use tracing::debug;

use super::facade::{millis, ColorSearch, Facade, ImageSearch};
use super::launcher::BrowserOptions;
use super::registry::DriverRegistry;
use super::retry;
use super::server::{Bot, ScriptContext};
use super::session::Session;
use super::web::WebBot;
use super::win::WinBot;

/// Directory on the device where the driver keeps script images.
pub const ANDROID_BASE_PATH: &str = "/storage/emulated/0/Android/data/com.aibot.client/files/";

/// Root of shared storage; transfer paths are made relative to it.
pub const SHARED_STORAGE_ROOT: &str = "/storage/emulated/0/";

/// Sub-poll used by the "any of these" compound operations.
const SUB_POLL_WAIT: Duration = Duration::from_millis(50);
const SUB_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Per-step poll used while sliding a list.
const SLIDE_STEP_WAIT: Duration = Duration::from_secs(1);
const SLIDE_STEP_INTERVAL: Duration = Duration::from_millis(500);

/// Screen size reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
}

/// Which way to slide a list while looking for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideDirection {
    /// Finger moves up, content scrolls down.
    Up,
    /// Finger moves down, content scrolls up.
    Down,
}

impl TryFrom<i32> for SlideDirection {
    type Error = DriverError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::Up),
            2 => Ok(Self::Down),
            other => Err(DriverError::invalid_argument(format!(
                "unknown slide direction {} (expected 1 or 2)",
                other
            ))),
        }
    }
}

/// Parameters for [`AndroidBot::click_element_by_slide`].
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSearch {
    pub distance: i32,
    pub duration: Duration,
    pub direction: SlideDirection,
    /// Maximum number of slides.
    pub count: u32,
    /// Stop early, unsuccessfully, once this element is visible.
    pub end_flag_xpath: Option<String>,
    pub wait_timeout: Duration,
    pub interval: Duration,
    pub raise_on_timeout: Option<bool>,
}

impl Default for SlideSearch {
    fn default() -> Self {
        Self {
            distance: 1000,
            duration: Duration::from_millis(500),
            direction: SlideDirection::Up,
            count: 999,
            end_flag_xpath: None,
            wait_timeout: Duration::from_secs(600),
            interval: Duration::from_millis(500),
            raise_on_timeout: None,
        }
    }
}

impl SlideSearch {
    fn swipe_points(&self) -> (Point, Point) {
        let distance = f64::from(self.distance);
        match self.direction {
            SlideDirection::Up => (Point::new(500.0, 300.0 + distance), Point::new(500.0, 300.0)),
            SlideDirection::Down => (Point::new(500.0, 300.0), Point::new(500.0, 300.0 + distance)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlideOutcome {
    Clicked,
    EndReached,
    Exhausted,
}

/// A connected Android device.
#[derive(Debug, Clone)]
pub struct AndroidBot {
    facade: Facade,
    registry: Arc<DriverRegistry>,
}

impl Bot for AndroidBot {
    const PLATFORM: &'static str = "android";

    fn attach(session: Arc<Session>, ctx: &ScriptContext) -> Self {
        Self::new(session, ctx.config.retry, ctx.registry.clone())
    }
}

impl AndroidBot {
    pub fn new(session: Arc<Session>, defaults: RetryPolicy, registry: Arc<DriverRegistry>) -> Self {
        Self {
            facade: Facade::new(session, defaults),
            registry,
        }
    }

    /// Replace the retry defaults used when a call leaves a field unset.
    pub fn with_defaults(mut self, defaults: RetryPolicy) -> Self {
        self.facade.set_defaults(defaults);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        self.facade.session()
    }

    // Screenshots and colours

    /// Save a screenshot on the device under [`ANDROID_BASE_PATH`].
    ///
    /// Returns the full device path, or `None` when the driver refused.
    pub async fn save_screenshot(
        &self,
        image_name: &str,
        region: Region,
        algorithm: Algorithm,
    ) -> Result<Option<String>> {
        if image_name.contains('/') {
            return Err(DriverError::invalid_argument("`image_name` cannot contain `/`"));
        }
        let path = format!("{}{}", ANDROID_BASE_PATH, image_name);
        let mut args = args!["saveScreenshot", path.as_str()];
        args.extend(region.to_args());
        args.extend(algorithm.to_args());

        let saved = self.facade.flag(args).await?;
        Ok(saved.then_some(path))
    }

    /// Screenshot bytes, or `None` when the driver answered `null`.
    pub async fn take_screenshot(
        &self,
        region: Region,
        algorithm: Algorithm,
        scale: f64,
    ) -> Result<Option<Bytes>> {
        let mut args = args!["takeScreenshot"];
        args.extend(region.to_args());
        args.extend(algorithm.to_args());
        args.push(scale.into());

        let bytes = self.facade.bytes(args).await?;
        Ok((bytes.as_ref() != probe::NULL.as_bytes()).then_some(bytes))
    }

    /// Colour at a point, e.g. `#008577`.
    pub async fn get_color(&self, point: Point) -> Result<Option<String>> {
        self.facade
            .optional_text(args!["getColor", point.x, point.y])
            .await
    }

    pub async fn find_color(
        &self,
        color: &str,
        search: &ColorSearch,
        overrides: RetryOverrides,
    ) -> Result<Option<Point>> {
        let mut args = args!["findColor", color, search.sub_colors_arg()];
        args.extend(search.region.to_args());
        args.push(search.similarity.into());

        self.facade
            .poll("find_color", overrides, args, |raw| probe::point("findColor", raw))
            .await
    }

    // Images

    /// First match of an image stored on the device.
    pub async fn find_image(
        &self,
        image_name: &str,
        search: &ImageSearch,
        overrides: RetryOverrides,
    ) -> Result<Option<Point>> {
        let single = ImageSearch { multi: 1, ..*search };
        let points = self.find_images(image_name, &single, overrides).await?;
        Ok(points.into_iter().next())
    }

    /// Up to `search.multi` matches; empty on timeout.
    pub async fn find_images(
        &self,
        image_name: &str,
        search: &ImageSearch,
        overrides: RetryOverrides,
    ) -> Result<Vec<Point>> {
        let path = format!("{}{}", ANDROID_BASE_PATH, image_name);
        let mut args = args!["findImage", path];
        args.extend(search.region.to_args());
        args.push(search.similarity.into());
        args.extend(search.algorithm.to_args());
        args.push(search.multi.into());

        let found = self
            .facade
            .poll("find_images", overrides, args, |raw| probe::points("findImage", raw))
            .await?;
        Ok(found.unwrap_or_default())
    }

    /// Regions that changed between two frames `frame_gap` apart.
    pub async fn find_dynamic_image(
        &self,
        frame_gap: Duration,
        region: Region,
        overrides: RetryOverrides,
    ) -> Result<Vec<Point>> {
        let gap_ms = u64::try_from(frame_gap.as_millis()).unwrap_or(u64::MAX);
        let mut args = args!["findAnimation", gap_ms];
        args.extend(region.to_args());

        let found = self
            .facade
            .poll("find_dynamic_image", overrides, args, |raw| {
                probe::points("findAnimation", raw)
            })
            .await?;
        Ok(found.unwrap_or_default())
    }

    // Touch

    pub async fn click(&self, point: Point) -> Result<bool> {
        self.facade.flag(args!["click", point.x, point.y]).await
    }

    pub async fn double_click(&self, point: Point) -> Result<bool> {
        self.facade.flag(args!["doubleClick", point.x, point.y]).await
    }

    pub async fn long_click(&self, point: Point, duration: Duration) -> Result<bool> {
        self.facade
            .flag(args!["longClick", point.x, point.y, millis(duration)])
            .await
    }

    pub async fn swipe(&self, start: Point, end: Point, duration: Duration) -> Result<bool> {
        self.facade
            .flag(args!["swipe", start.x, start.y, end.x, end.y, millis(duration)])
            .await
    }

    /// Trace a path of points as one gesture.
    pub async fn gesture(&self, path: &[Point], duration: Duration) -> Result<bool> {
        let encoded = path
            .iter()
            .map(|p| format!("{:?}/{:?}/", p.x, p.y))
            .collect::<Vec<_>>()
            .join("\n");
        self.facade
            .flag(args!["dispatchGesture", encoded, millis(duration)])
            .await
    }

    pub async fn press(&self, point: Point, duration: Duration) -> Result<bool> {
        self.facade
            .flag(args!["press", point.x, point.y, millis(duration)])
            .await
    }

    pub async fn move_to(&self, point: Point, duration: Duration) -> Result<bool> {
        self.facade
            .flag(args!["move", point.x, point.y, millis(duration)])
            .await
    }

    pub async fn release(&self) -> Result<bool> {
        self.facade.flag(args!["release"]).await
    }

    /// Press, hold for `duration`, then release.
    pub async fn press_release(&self, point: Point, duration: Duration) -> Result<bool> {
        if !self.press(point, duration).await? {
            return Ok(false);
        }
        tokio::time::sleep(duration).await;
        self.release().await
    }

    // Elements

    pub async fn get_element_rect(&self, xpath: &str, overrides: RetryOverrides) -> Result<Option<Rect>> {
        self.facade
            .poll("get_element_rect", overrides, args!["getElementRect", xpath], |raw| {
                probe::rect("getElementRect", raw)
            })
            .await
    }

    pub async fn get_element_desc(&self, xpath: &str, overrides: RetryOverrides) -> Result<Option<String>> {
        self.facade
            .poll(
                "get_element_desc",
                overrides,
                args!["getElementDescription", xpath],
                |raw| Ok(probe::text(raw)),
            )
            .await
    }

    pub async fn get_element_text(&self, xpath: &str, overrides: RetryOverrides) -> Result<Option<String>> {
        self.facade
            .poll("get_element_text", overrides, args!["getElementText", xpath], |raw| {
                Ok(probe::text(raw))
            })
            .await
    }

    pub async fn set_element_text(
        &self,
        xpath: &str,
        text: &str,
        overrides: RetryOverrides,
    ) -> Result<bool> {
        self.facade
            .poll_flag(
                "set_element_text",
                overrides,
                args!["setElementText", xpath, text],
                probe::acknowledged,
            )
            .await
    }

    pub async fn click_element(&self, xpath: &str, overrides: RetryOverrides) -> Result<bool> {
        self.facade
            .poll_flag(
                "click_element",
                overrides,
                args!["clickElement", xpath],
                probe::acknowledged,
            )
            .await
    }

    /// Click whichever of `xpaths` becomes clickable first.
    ///
    /// Each round tries every xpath with a short, never-raising sub-poll.
    pub async fn click_any_elements(&self, xpaths: &[&str], overrides: RetryOverrides) -> Result<bool> {
        let policy = self.facade.defaults().with(overrides);
        let sub = sub_poll();
        let clicked = retry::poll("click_any_elements", policy, move || async move {
            for xpath in xpaths {
                if self.click_element(xpath, sub).await? {
                    return Ok(Probe::Found(()));
                }
            }
            Ok::<_, DriverError>(Probe::NotFound)
        })
        .await?;
        Ok(clicked.is_some())
    }

    /// Scroll a scrollable element; `direction` 0 scrolls forward, 1 backward.
    pub async fn scroll_element(&self, xpath: &str, direction: i32) -> Result<bool> {
        self.facade
            .flag(args!["scrollElement", xpath, direction])
            .await
    }

    /// Wait for the element to appear. Never raises on timeout.
    pub async fn element_exists(&self, xpath: &str, overrides: RetryOverrides) -> Result<bool> {
        self.facade
            .poll_flag(
                "element_exists",
                overrides.raise(false),
                args!["existsElement", xpath],
                probe::acknowledged,
            )
            .await
    }

    /// Wait for the element to disappear. Never raises on timeout.
    pub async fn element_not_exists(&self, xpath: &str, overrides: RetryOverrides) -> Result<bool> {
        self.facade
            .poll_flag(
                "element_not_exists",
                overrides.raise(false),
                args!["existsElement", xpath],
                probe::absent,
            )
            .await
    }

    /// The first of `xpaths` found to exist, or `None`. Never raises on timeout.
    pub async fn any_elements_exists(
        &self,
        xpaths: &[&str],
        overrides: RetryOverrides,
    ) -> Result<Option<String>> {
        let policy = self.facade.defaults().with(overrides.raise(false));
        let sub = sub_poll();
        retry::poll("any_elements_exists", policy, move || async move {
            for xpath in xpaths {
                if self.element_exists(xpath, sub).await? {
                    return Ok(Probe::Found(xpath.to_string()));
                }
            }
            Ok::<_, DriverError>(Probe::NotFound)
        })
        .await
    }

    pub async fn element_is_selected(&self, xpath: &str) -> Result<bool> {
        self.facade.flag(args!["isSelectedElement", xpath]).await
    }

    /// Slide a list until `xpath` can be clicked.
    ///
    /// Stops with `false` when `end_flag_xpath` shows up. Running out of
    /// slides or time counts as a timeout.
    pub async fn click_element_by_slide(&self, xpath: &str, search: &SlideSearch) -> Result<bool> {
        let policy = RetryPolicy::new(
            search.wait_timeout,
            search.interval,
            search
                .raise_on_timeout
                .unwrap_or(self.facade.defaults().raise_on_timeout),
        );
        let (start, end) = search.swipe_points();
        let step = RetryOverrides::none()
            .wait(SLIDE_STEP_WAIT)
            .interval(SLIDE_STEP_INTERVAL)
            .raise(false);
        let slides = AtomicU32::new(0);
        let slides = &slides;

        let outcome = retry::poll("click_element_by_slide", policy, move || async move {
            if slides.fetch_add(1, Ordering::Relaxed) >= search.count {
                return Ok(Probe::Found(SlideOutcome::Exhausted));
            }
            if self.click_element(xpath, step).await? {
                return Ok(Probe::Found(SlideOutcome::Clicked));
            }
            if let Some(flag) = search.end_flag_xpath.as_deref() {
                if self.element_exists(flag, step).await? {
                    return Ok(Probe::Found(SlideOutcome::EndReached));
                }
            }
            self.swipe(start, end, search.duration).await?;
            Ok::<_, DriverError>(Probe::NotFound)
        })
        .await?;

        match outcome {
            Some(SlideOutcome::Clicked) => Ok(true),
            Some(SlideOutcome::EndReached) => Ok(false),
            Some(SlideOutcome::Exhausted) if policy.raise_on_timeout => {
                Err(DriverError::timeout("click_element_by_slide"))
            }
            Some(SlideOutcome::Exhausted) | None => Ok(false),
        }
    }

    // Files

    /// Upload a local file. `to_path` is made relative to shared storage.
    pub async fn push_file(&self, local_path: impl AsRef<Path>, to_path: &str) -> Result<bool> {
        let local_path = local_path.as_ref();
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| DriverError::LocalFile {
                path: local_path.display().to_string(),
                reason: e.to_string(),
            })?;
        let to_path = shared_storage_path(to_path);
        debug!("Pushing {} bytes to {}", data.len(), to_path);

        let reply = self
            .facade
            .session()
            .push_file("pushFile", &to_path, &data)
            .await?;
        Ok(probe::is_true(&reply))
    }

    /// Download a device file. Returns `false` when the device has no such file.
    pub async fn pull_file(&self, remote_path: &str, local_path: impl AsRef<Path>) -> Result<bool> {
        let remote_path = shared_storage_path(remote_path);
        let data = self.facade.bytes(args!["pullFile", remote_path]).await?;
        if data.as_ref() == probe::NULL.as_bytes() {
            return Ok(false);
        }

        let local_path = local_path.as_ref();
        tokio::fs::write(local_path, &data)
            .await
            .map_err(|e| DriverError::LocalFile {
                path: local_path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(true)
    }

    // Device

    /// Launch an app by name or package. Never raises on timeout.
    pub async fn start_app(&self, name: &str, overrides: RetryOverrides) -> Result<bool> {
        self.facade
            .poll_flag(
                "start_app",
                overrides.raise(false),
                args!["startApp", name],
                probe::acknowledged,
            )
            .await
    }

    pub async fn app_is_running(&self, app_name: &str) -> Result<bool> {
        // the driver really spells it this way
        self.facade.flag(args!["appIsRunnig", app_name]).await
    }

    pub async fn get_installed_packages(&self) -> Result<Vec<String>> {
        self.facade.list(args!["getInstalledPackages"]).await
    }

    pub async fn get_android_id(&self) -> Result<String> {
        self.facade.text(args!["getAndroidId"]).await
    }

    pub async fn get_window_size(&self) -> Result<WindowSize> {
        let raw = self.facade.text(args!["getWindowSize"]).await?;
        let size = Point::parse(&raw)
            .ok_or_else(|| DriverError::unexpected_response("getWindowSize", &raw))?;
        Ok(WindowSize {
            width: size.x,
            height: size.y,
        })
    }

    pub async fn show_toast(&self, text: &str, duration: Duration) -> Result<bool> {
        self.facade
            .flag(args!["showToast", text, millis(duration)])
            .await
    }

    pub async fn send_keys(&self, text: &str) -> Result<bool> {
        self.facade.flag(args!["sendKeys", text]).await
    }

    pub async fn send_vk(&self, vk: i32) -> Result<bool> {
        self.facade.flag(args!["sendVk", vk]).await
    }

    pub async fn back(&self) -> Result<bool> {
        self.facade.flag(args!["back"]).await
    }

    pub async fn home(&self) -> Result<bool> {
        self.facade.flag(args!["home"]).await
    }

    pub async fn recent_tasks(&self) -> Result<bool> {
        self.facade.flag(args!["recents"]).await
    }

    pub async fn open_uri(&self, uri: &str) -> Result<bool> {
        self.facade.flag(args!["openUri", uri]).await
    }

    pub async fn get_activity(&self) -> Result<String> {
        self.facade.text(args!["getActivity"]).await
    }

    pub async fn get_package(&self) -> Result<String> {
        self.facade.text(args!["getPackage"]).await
    }

    pub async fn set_clipboard_text(&self, text: &str) -> Result<bool> {
        self.facade.flag(args!["setClipboardText", text]).await
    }

    pub async fn get_clipboard_text(&self) -> Result<String> {
        self.facade.text(args!["getClipboardText"]).await
    }

    /// Device address as seen by this end of the connection. No I/O.
    pub fn get_device_ip(&self) -> String {
        self.facade.session().peer_ip().to_string()
    }

    /// Ask the driver to exit.
    pub async fn close_driver(&self) -> Result<()> {
        self.facade.text(args!["closeDriver"]).await?;
        Ok(())
    }

    // Desktop and browser drivers reached through the registry

    pub async fn build_win_driver(&self, port: u16, local: bool, force_new: bool) -> Result<Arc<WinBot>> {
        if force_new {
            self.registry.force_new_win(port, local).await
        } else {
            self.registry.get_or_create_win(port, local).await
        }
    }

    pub async fn build_web_driver(
        &self,
        port: u16,
        local: bool,
        options: Option<BrowserOptions>,
        force_new: bool,
    ) -> Result<Arc<WebBot>> {
        if force_new {
            self.registry.force_new_web(port, local, options).await
        } else {
            self.registry.get_or_create_web(port, local, options).await
        }
    }
}

fn sub_poll() -> RetryOverrides {
    RetryOverrides::none()
        .wait(SUB_POLL_WAIT)
        .interval(SUB_POLL_INTERVAL)
        .raise(false)
}

fn shared_storage_path(path: &str) -> String {
    if path.starts_with(SHARED_STORAGE_ROOT) {
        path.to_string()
    } else {
        format!("{}{}", SHARED_STORAGE_ROOT, path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::Config;
    use crate::driver::test_support::connected_session;

    type Requests = Arc<Mutex<Vec<Vec<String>>>>;

    async fn bot<F>(handler: F) -> (AndroidBot, Requests)
    where
        F: FnMut(&[String]) -> Vec<u8> + Send + 'static,
    {
        let fake = connected_session(handler).await;
        let config = Arc::new(Config::default());
        let registry = Arc::new(DriverRegistry::new(config));
        let defaults = RetryPolicy::new(Duration::from_millis(300), Duration::from_millis(20), false);
        (
            AndroidBot::new(Arc::new(fake.session), defaults, registry),
            fake.requests,
        )
    }

    fn quick() -> RetryOverrides {
        RetryOverrides::none().wait(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_find_color_polls_until_found() {
        let mut calls = 0;
        let (bot, requests) = bot(move |_| {
            calls += 1;
            if calls < 3 {
                b"-1.0|-1.0".to_vec()
            } else {
                b"120.0|340.0".to_vec()
            }
        })
        .await;

        let point = bot
            .find_color("#008577", &ColorSearch::default(), RetryOverrides::none())
            .await
            .unwrap();
        assert_eq!(point, Some(Point::new(120.0, 340.0)));

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0],
            vec!["findColor", "#008577", "null", "0", "0", "0", "0", "0.9"]
        );
    }

    #[tokio::test]
    async fn test_find_images_prefixes_base_path_and_splits_points() {
        let (bot, requests) = bot(|_| b"10|20/30|40".to_vec()).await;
        let search = ImageSearch {
            algorithm: Algorithm::new(5, 0, 0),
            multi: 2,
            ..ImageSearch::default()
        };

        let points = bot.find_images("logo.png", &search, quick()).await.unwrap();
        assert_eq!(points, vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);

        let sent = &requests.lock().unwrap()[0];
        assert_eq!(sent[1], format!("{}logo.png", ANDROID_BASE_PATH));
        // adaptive algorithm forces 127/255
        assert_eq!(&sent[7..11], &["5", "127", "255", "2"]);
    }

    #[tokio::test]
    async fn test_find_image_timeout_is_none() {
        let (bot, _) = bot(|_| b"-1.0|-1.0".to_vec()).await;
        let point = bot
            .find_image("missing.png", &ImageSearch::default(), quick())
            .await
            .unwrap();
        assert_eq!(point, None);
    }

    #[tokio::test]
    async fn test_find_image_raises_when_asked() {
        let (bot, _) = bot(|_| b"-1.0|-1.0".to_vec()).await;
        let err = bot
            .find_image("missing.png", &ImageSearch::default(), quick().raise(true))
            .await
            .unwrap_err();
        assert_eq!(err, DriverError::timeout("find_images"));
    }

    #[tokio::test]
    async fn test_save_screenshot_rejects_slash_before_io() {
        let (bot, requests) = bot(|_| b"true".to_vec()).await;
        let err = bot
            .save_screenshot("a/b.png", Region::default(), Algorithm::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_screenshot_returns_device_path() {
        let (bot, _) = bot(|_| b"true".to_vec()).await;
        let path = bot
            .save_screenshot("shot.png", Region::default(), Algorithm::default())
            .await
            .unwrap();
        assert_eq!(path, Some(format!("{}shot.png", ANDROID_BASE_PATH)));
    }

    #[tokio::test]
    async fn test_take_screenshot_null_is_none() {
        let (bot, _) = bot(|_| b"null".to_vec()).await;
        let shot = bot
            .take_screenshot(Region::default(), Algorithm::default(), 1.0)
            .await
            .unwrap();
        assert!(shot.is_none());
    }

    #[tokio::test]
    async fn test_touch_commands_send_milliseconds() {
        let (bot, requests) = bot(|_| b"true".to_vec()).await;
        assert!(bot
            .long_click(Point::new(1.0, 2.0), Duration::from_millis(1500))
            .await
            .unwrap());
        assert!(bot
            .swipe(Point::new(0.0, 0.0), Point::new(0.0, 500.0), Duration::from_millis(500))
            .await
            .unwrap());

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0], vec!["longClick", "1.0", "2.0", "1500.0"]);
        assert_eq!(requests[1][5], "500.0");
    }

    #[tokio::test]
    async fn test_get_element_rect_sentinel() {
        let (bot, _) = bot(|_| b"-1|-1|-1|-1".to_vec()).await;
        assert_eq!(bot.get_element_rect("//Button", quick()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_element_not_exists_waits_for_disappearance() {
        let mut calls = 0;
        let (bot, _) = bot(move |_| {
            calls += 1;
            if calls < 2 { b"true".to_vec() } else { b"false".to_vec() }
        })
        .await;
        assert!(bot
            .element_not_exists("//Dialog", RetryOverrides::none())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_element_exists_never_raises() {
        let (bot, _) = bot(|_| b"false".to_vec()).await;
        let exists = bot
            .element_exists("//Missing", quick().raise(true))
            .await
            .unwrap();
        assert!(!exists);
    }

    #[tokio::test]
    async fn test_click_any_elements_clicks_second() {
        let (bot, requests) = bot(|req| {
            if req[1] == "//B" { b"true".to_vec() } else { b"false".to_vec() }
        })
        .await;

        assert!(bot
            .click_any_elements(&["//A", "//B"], RetryOverrides::none())
            .await
            .unwrap());
        assert!(requests
            .lock()
            .unwrap()
            .iter()
            .any(|r| r[0] == "clickElement" && r[1] == "//B"));
    }

    #[tokio::test]
    async fn test_any_elements_exists_returns_xpath() {
        let (bot, _) = bot(|req| {
            if req[1] == "//Second" { b"true".to_vec() } else { b"false".to_vec() }
        })
        .await;
        let found = bot
            .any_elements_exists(&["//First", "//Second"], RetryOverrides::none())
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("//Second"));
    }

    #[tokio::test]
    async fn test_click_element_by_slide_swipes_then_clicks() {
        let mut swiped = false;
        let (bot, requests) = bot(move |req| match req[0].as_str() {
            "swipe" => {
                swiped = true;
                b"true".to_vec()
            }
            "clickElement" if swiped => b"true".to_vec(),
            _ => b"false".to_vec(),
        })
        .await;

        let search = SlideSearch {
            interval: Duration::from_millis(10),
            wait_timeout: Duration::from_secs(10),
            ..SlideSearch::default()
        };
        let clicked = bot.click_element_by_slide("//Item", &search).await.unwrap();
        assert!(clicked);

        let requests = requests.lock().unwrap();
        let swipe = requests.iter().find(|r| r[0] == "swipe").unwrap();
        assert_eq!(swipe[1..], ["500.0", "1300.0", "500.0", "300.0", "500.0"]);
    }

    #[tokio::test]
    async fn test_click_element_by_slide_gives_up_after_count() {
        let (bot, _) = bot(|req| match req[0].as_str() {
            "swipe" => b"true".to_vec(),
            _ => b"false".to_vec(),
        })
        .await;

        let search = SlideSearch {
            count: 0,
            raise_on_timeout: Some(true),
            ..SlideSearch::default()
        };
        let err = bot.click_element_by_slide("//Item", &search).await.unwrap_err();
        assert_eq!(err, DriverError::timeout("click_element_by_slide"));
    }

    #[tokio::test]
    async fn test_click_element_by_slide_stops_at_end_flag() {
        let (bot, requests) = bot(|req| match req[0].as_str() {
            "clickElement" => b"false".to_vec(),
            "existsElement" => b"true".to_vec(),
            _ => b"true".to_vec(),
        })
        .await;

        let search = SlideSearch {
            end_flag_xpath: Some("//End".to_string()),
            ..SlideSearch::default()
        };
        let clicked = bot.click_element_by_slide("//Item", &search).await.unwrap();
        assert!(!clicked);
        assert!(!requests.lock().unwrap().iter().any(|r| r[0] == "swipe"));
    }

    #[test]
    fn test_slide_direction_validation() {
        assert_eq!(SlideDirection::try_from(1).unwrap(), SlideDirection::Up);
        assert_eq!(SlideDirection::try_from(2).unwrap(), SlideDirection::Down);
        assert!(matches!(
            SlideDirection::try_from(3),
            Err(DriverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_slide_points() {
        let up = SlideSearch::default().swipe_points();
        assert_eq!(up, (Point::new(500.0, 1300.0), Point::new(500.0, 300.0)));
        let down = SlideSearch {
            direction: SlideDirection::Down,
            distance: 200,
            ..SlideSearch::default()
        }
        .swipe_points();
        assert_eq!(down, (Point::new(500.0, 300.0), Point::new(500.0, 500.0)));
    }

    #[tokio::test]
    async fn test_installed_packages_and_window_size() {
        let (bot, _) = bot(|req| match req[0].as_str() {
            "getInstalledPackages" => b"com.a|com.b".to_vec(),
            "getWindowSize" => b"1080|2340".to_vec(),
            _ => b"null".to_vec(),
        })
        .await;
        assert_eq!(bot.get_installed_packages().await.unwrap(), vec!["com.a", "com.b"]);
        assert_eq!(
            bot.get_window_size().await.unwrap(),
            WindowSize {
                width: 1080.0,
                height: 2340.0
            }
        );
    }

    #[tokio::test]
    async fn test_push_and_pull_file() {
        let (bot, requests) = bot(|req| match req[0].as_str() {
            "pullFile" => b"remote-bytes".to_vec(),
            _ => b"true".to_vec(),
        })
        .await;

        let dir = std::env::temp_dir().join(format!("drivewire-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let src = dir.join("src.txt");
        tokio::fs::write(&src, b"local-bytes").await.unwrap();

        assert!(bot.push_file(&src, "Download/src.txt").await.unwrap());
        let dst = dir.join("dst.txt");
        assert!(bot.pull_file("Download/remote.txt", &dst).await.unwrap());
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"remote-bytes");

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0][1], "/storage/emulated/0/Download/src.txt");
        assert_eq!(requests[0][2], "local-bytes");
        assert_eq!(requests[1][1], "/storage/emulated/0/Download/remote.txt");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_push_missing_local_file() {
        let (bot, requests) = bot(|_| b"true".to_vec()).await;
        let err = bot
            .push_file("/definitely/not/here.bin", "x.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::LocalFile { .. }));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_device_ip_is_peer_address() {
        let (bot, requests) = bot(|_| b"true".to_vec()).await;
        assert_eq!(bot.get_device_ip(), "127.0.0.1");
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gesture_path_encoding() {
        let (bot, requests) = bot(|_| b"true".to_vec()).await;
        let path = [Point::new(100.0, 200.0), Point::new(300.5, 400.0)];
        assert!(bot.gesture(&path, Duration::from_millis(800)).await.unwrap());

        assert_eq!(
            requests.lock().unwrap()[0],
            vec!["dispatchGesture", "100.0/200.0/\n300.5/400.0/", "800.0"]
        );
    }

    #[tokio::test]
    async fn test_find_dynamic_image_polls_sentinel_to_empty() {
        let (bot, requests) = bot(|_| b"-1.0|-1.0".to_vec()).await;
        let overrides = RetryOverrides::none()
            .wait(Duration::from_millis(60))
            .interval(Duration::from_millis(20));

        let found = bot
            .find_dynamic_image(Duration::from_millis(250), Region::FULL_SCREEN, overrides)
            .await
            .unwrap();
        assert_eq!(found, Vec::new());

        let requests = requests.lock().unwrap();
        assert!(requests.len() >= 2);
        assert_eq!(requests[0], vec!["findAnimation", "250", "0", "0", "0", "0"]);
    }

    #[tokio::test]
    async fn test_find_dynamic_image_splits_points() {
        let (bot, _) = bot(|_| b"10.0|20.0/30.0|40.0".to_vec()).await;
        let found = bot
            .find_dynamic_image(Duration::from_millis(100), Region::FULL_SCREEN, quick())
            .await
            .unwrap();
        assert_eq!(found, vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
    }

    #[tokio::test]
    async fn test_press_release_stops_when_press_fails() {
        let (bot, requests) = bot(|_| b"false".to_vec()).await;
        let pressed = bot
            .press_release(Point::new(5.0, 5.0), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(!pressed);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], vec!["press", "5.0", "5.0", "10.0"]);
    }

    #[tokio::test]
    async fn test_press_release_holds_then_releases() {
        let (bot, requests) = bot(|_| b"true".to_vec()).await;
        assert!(bot
            .press_release(Point::new(5.0, 5.0), Duration::from_millis(10))
            .await
            .unwrap());
        let sent: Vec<String> = requests.lock().unwrap().iter().map(|r| r[0].clone()).collect();
        assert_eq!(sent, vec!["press", "release"]);
    }
}
