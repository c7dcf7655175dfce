use crate::config::{Credentials, LoginSettings, FETCH_ENDPOINT};
use crate::error::AuthError;
use crate::scrapers::traits::SessionProvider;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SIGN_IN_BUTTON_XPATH: &str = "//button[contains(normalize-space(.), 'Sign In')]";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAP_SETTLE: Duration = Duration::from_secs(2);

/// Authenticated HTTP context shared read-only by every cell fetch.
///
/// Cloning is cheap; all clones share one connection pool and cookie jar.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    client: Client,
}

impl SessionHandle {
    /// Wrap an already-configured client (tests use a bare one).
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Build a client whose jar holds the cookies the browser ended up with.
    pub fn from_cookies(cookies: &[BrowserCookie]) -> Result<Self, AuthError> {
        let jar = Arc::new(cookie_jar(cookies));
        let client = Client::builder().cookie_provider(jar).build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// The parts of a browser cookie needed to replay it from `reqwest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
}

impl From<Network::Cookie> for BrowserCookie {
    fn from(c: Network::Cookie) -> Self {
        Self {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path,
            secure: c.secure,
        }
    }
}

/// Load browser cookies into a jar, each scoped to its own domain.
pub fn cookie_jar(cookies: &[BrowserCookie]) -> Jar {
    let jar = Jar::default();
    for c in cookies {
        let host = c.domain.trim_start_matches('.');
        let path = if c.path.is_empty() { "/" } else { c.path.as_str() };
        let url = match Url::parse(&format!("https://{}{}", host, path)) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping cookie {} for unusable domain {:?}: {}", c.name, c.domain, e);
                continue;
            }
        };
        let mut header = format!("{}={}; Domain={}; Path={}", c.name, c.value, host, path);
        if c.secure {
            header.push_str("; Secure");
        }
        jar.add_cookie_str(&header, &url);
    }
    jar
}

/// Text of any error banner the sign-in page shows, if present.
pub fn login_error_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(".alert-danger, .error, .error-message, [role=alert]").ok()?;
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

/// Whether the page still carries the password field of the sign-in form.
pub fn has_sign_in_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    Selector::parse("#password")
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false)
}

/// What the page looks like once the sign-in wait has run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginCheck {
    /// The sign-in form is gone.
    Proceed,
    /// The form is still shown without an error; the site may sign in without
    /// redirecting. Session cookies decide.
    Unconfirmed,
    /// The form is still shown together with this error banner.
    Rejected(String),
}

/// Classify the page left behind when the URL never moved off sign-in.
pub fn check_login_page(html: &str) -> LoginCheck {
    if !has_sign_in_form(html) {
        return LoginCheck::Proceed;
    }
    match login_error_text(html) {
        Some(message) => LoginCheck::Rejected(message),
        None => LoginCheck::Unconfirmed,
    }
}

fn browser_step<T, E: fmt::Display>(step: &'static str, result: Result<T, E>) -> Result<T, AuthError> {
    result.map_err(|e| AuthError::Browser {
        step,
        message: e.to_string(),
    })
}

/// Signs in through the site's web form using headless Chrome.
pub struct BrowserSessionProvider {
    browser: Browser,
    settings: LoginSettings,
    screenshot: Option<PathBuf>,
}

impl BrowserSessionProvider {
    /// Launch Chrome. Nothing is requested until [`SessionProvider::authenticate`].
    pub fn launch(settings: LoginSettings) -> Result<Self, AuthError> {
        info!("Launching headless Chrome...");

        let options = browser_step(
            "launch options",
            LaunchOptions::default_builder()
                .headless(settings.headless)
                .window_size(Some((1280, 720)))
                .build(),
        )?;
        let browser = browser_step("launch", Browser::new(options))?;

        Ok(Self {
            browser,
            settings,
            screenshot: None,
        })
    }

    /// Save a PNG of the map page to `path` once signed in.
    pub fn with_screenshot(mut self, path: PathBuf) -> Self {
        self.screenshot = Some(path);
        self
    }

    fn page_html(tab: &Tab) -> String {
        match tab.evaluate("document.documentElement.outerHTML", false) {
            Ok(result) => result
                .value
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            Err(e) => {
                debug!("Could not read page HTML: {}", e);
                String::new()
            }
        }
    }

    fn submit_credentials(&self, tab: &Tab, credentials: &Credentials) -> Result<(), AuthError> {
        info!("Navigating to login page...");
        browser_step("open sign-in page", tab.navigate_to(&self.settings.sign_in_url))?;
        browser_step("load sign-in page", tab.wait_until_navigated())?;

        info!("Filling credentials...");
        browser_step("find email field", tab.wait_for_element("#email"))
            .and_then(|el| browser_step("focus email field", el.click().map(|_| ())))?;
        browser_step("type email", tab.type_str(&credentials.username))?;

        browser_step("find password field", tab.wait_for_element("#password"))
            .and_then(|el| browser_step("focus password field", el.click().map(|_| ())))?;
        browser_step("type password", tab.type_str(&credentials.password))?;

        info!("Clicking sign in...");
        browser_step("find sign-in button", tab.wait_for_xpath(SIGN_IN_BUTTON_XPATH))
            .and_then(|el| browser_step("click sign-in button", el.click().map(|_| ())))?;
        Ok(())
    }

    /// Poll until the tab leaves the sign-in page or the wait runs out. Only a
    /// visible error banner on the sign-in form fails here.
    fn wait_for_login(&self, tab: &Tab) -> Result<(), AuthError> {
        info!("Waiting for login to complete...");
        let started = Instant::now();
        loop {
            let url = tab.get_url();
            if !url.contains("sign-in") {
                debug!("Login redirected to {}", url);
                return Ok(());
            }
            if started.elapsed() >= self.settings.wait {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        match check_login_page(&Self::page_html(tab)) {
            LoginCheck::Proceed => {
                info!("Sign-in form cleared without a redirect");
                Ok(())
            }
            LoginCheck::Unconfirmed => {
                warn!(
                    "No redirect after {:?}; continuing to the map page",
                    self.settings.wait
                );
                Ok(())
            }
            LoginCheck::Rejected(message) => {
                warn!("Sign-in page reports: {}", message);
                Err(AuthError::Rejected)
            }
        }
    }

    fn capture_screenshot(&self, tab: &Tab, path: &Path) {
        info!("Capturing screenshot...");
        let result = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| e.to_string())
            .and_then(|png| std::fs::write(path, png).map_err(|e| e.to_string()));
        match result {
            Ok(()) => info!("Saved screenshot to {}", path.display()),
            Err(e) => warn!("Screenshot failed: {}", e),
        }
    }

    fn session_cookies(&self, tab: &Tab) -> Result<Vec<BrowserCookie>, AuthError> {
        let urls = vec![
            self.settings.sign_in_url.clone(),
            self.settings.map_url.clone(),
            FETCH_ENDPOINT.to_string(),
        ];
        let cookies = browser_step(
            "read cookies",
            tab.call_method(Network::GetCookies { urls: Some(urls) }),
        )?
        .cookies;
        Ok(cookies.into_iter().map(BrowserCookie::from).collect())
    }
}

impl SessionProvider for BrowserSessionProvider {
    fn authenticate(&self, credentials: &Credentials) -> Result<SessionHandle, AuthError> {
        let tab = browser_step("open tab", self.browser.new_tab())?;
        tab.set_default_timeout(self.settings.wait);

        self.submit_credentials(&tab, credentials)?;
        self.wait_for_login(&tab)?;

        info!("Extracting session data...");
        browser_step("open map page", tab.navigate_to(&self.settings.map_url))?;
        browser_step("load map page", tab.wait_until_navigated())?;
        thread::sleep(MAP_SETTLE);

        if let Some(path) = &self.screenshot {
            self.capture_screenshot(&tab, path);
        }

        let cookies = self.session_cookies(&tab)?;
        if cookies.is_empty() {
            return Err(AuthError::NoCookies);
        }
        info!("Session established with {} cookies", cookies.len());

        SessionHandle::from_cookies(&cookies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    fn cookie(name: &str, domain: &str) -> BrowserCookie {
        BrowserCookie {
            name: name.into(),
            value: format!("{}-value", name),
            domain: domain.into(),
            path: "/".into(),
            secure: true,
        }
    }

    #[test]
    fn jar_scopes_cookies_by_domain() {
        let jar = cookie_jar(&[cookie("PHPSESSID", ".zealty.ca"), cookie("map", "bcrealestatemap.ca")]);

        let site = Url::parse("https://www.zealty.ca/map.html").unwrap();
        let sent = jar.cookies(&site).unwrap();
        assert_eq!(sent.to_str().unwrap(), "PHPSESSID=PHPSESSID-value");

        let backend = Url::parse("https://bcrealestatemap.ca/svcFetchDB.php").unwrap();
        let sent = jar.cookies(&backend).unwrap();
        assert_eq!(sent.to_str().unwrap(), "map=map-value");
    }

    #[test]
    fn detects_rejected_sign_in() {
        let html = r#"<html><body>
            <div class="alert-danger"> Invalid email or password </div>
            <form><input id="email"><input id="password" type="password"></form>
        </body></html>"#;
        assert!(has_sign_in_form(html));
        assert_eq!(login_error_text(html).as_deref(), Some("Invalid email or password"));

        let map = "<html><body><div id='map'></div></body></html>";
        assert!(!has_sign_in_form(map));
        assert_eq!(login_error_text(map), None);
    }

    #[test]
    fn only_an_error_banner_on_the_form_rejects_login() {
        let rejected = r#"<form><div role="alert">Wrong password</div><input id="password"></form>"#;
        assert_eq!(check_login_page(rejected), LoginCheck::Rejected("Wrong password".into()));

        let still_on_form = r#"<form><input id="email"><input id="password"></form>"#;
        assert_eq!(check_login_page(still_on_form), LoginCheck::Unconfirmed);

        let signed_in_in_place = "<html><body><a href='/logout'>Sign out</a></body></html>";
        assert_eq!(check_login_page(signed_in_in_place), LoginCheck::Proceed);
    }
}
