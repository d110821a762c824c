//! Server-rendered HTML for the landing, auth hand-off, dashboard and
//! subscribe pages.
//!
//! Markup is intentionally plain. The dashboard and subscribe pages carry a
//! small inline script each: the dashboard one re-filters and re-sorts the
//! already rendered cards in the browser (debounced, never refetching) and the
//! subscribe one drives the hosted checkout overlay.

use std::fmt::Write;

use crate::dashboard::{DashboardContent, DashboardView, GridEntry};
use crate::models::{Profile, SortKey};
use crate::subscribe::{CheckoutEvent, SubscribeState, SUBSCRIBE_FAILED};

const TITLE: &str = "NicheFire - Find The Next Viral Hit";
const DESCRIPTION: &str = "NicheFire uses autonomous bots to scan YouTube Shorts 24/7, \
identifying viral outliers before they hit the mainstream. Stop guessing, start discovering.";

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encodes a value for embedding in an inline `<script>` as a JS string literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

fn layout(page_title: Option<&str>, body: &str) -> String {
    let title = match page_title {
        Some(t) => format!("{} | NicheFire", t),
        None => TITLE.to_string(),
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\" class=\"dark\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{}</title>\n<meta name=\"description\" content=\"{}\">\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(&title),
        escape(DESCRIPTION),
        body
    )
}

fn header(profile: Option<&Profile>) -> String {
    let user = match profile {
        Some(p) => format!(
            "<span class=\"user\">{}</span> <a href=\"/sign-out\">Sign out</a>",
            escape(p.first_name.as_deref().or(p.email.as_deref()).unwrap_or("Account"))
        ),
        None => String::new(),
    };
    format!(
        "<header><a href=\"/\" class=\"brand\">NicheFire</a><nav>{}</nav></header>",
        user
    )
}

// ============ Landing ============

pub fn render_landing(profile: Option<&Profile>, sign_up_path: &str) -> String {
    let cta = match profile {
        Some(_) => "<a class=\"cta\" href=\"/dashboard\">Go to Dashboard</a>".to_string(),
        None => format!(
            "<a class=\"cta\" href=\"{}\">Get Started</a>",
            escape(sign_up_path)
        ),
    };
    let body = format!(
        "{}\n<main>\n<h1>Find The Next Viral Hit</h1>\n<p>{}</p>\n{}\n\
<ul class=\"features\"><li>Unlimited Outlier Discovery</li><li>24/7 Data Collection</li>\
<li>High-Speed Data Enrichment</li></ul>\n</main>",
        header(profile),
        escape(DESCRIPTION),
        cta
    );
    layout(None, &body)
}

// ============ Auth hand-off ============

/// Page for `/sign-in` and `/sign-up`; links out to the identity provider.
pub fn render_auth_handoff(title: &str, hosted_url: Option<&str>) -> String {
    let action = match hosted_url {
        Some(url) => format!(
            "<a class=\"cta\" href=\"{}\">Continue to {}</a>",
            escape(url),
            escape(title)
        ),
        None => "<p class=\"error\">Sign-in is not available right now.</p>".to_string(),
    };
    let body = format!(
        "{}\n<main>\n<h1>{}</h1>\n{}\n</main>",
        header(None),
        escape(title),
        action
    );
    layout(Some(title), &body)
}

// ============ Dashboard ============

pub struct DashboardPage<'a> {
    pub view: &'a DashboardView,
    pub profile: Option<&'a Profile>,
    pub debounce_ms: u64,
}

fn render_card(entry: &GridEntry<'_>) -> String {
    let card = &entry.card;
    let metrics = SortKey::ALL.map(|k| entry.video.metric(k));
    format!(
        "<a class=\"card\"{hidden} href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\" \
data-position=\"{position}\" \
data-title=\"{title_attr}\" data-creator=\"{creator_attr}\" data-viral_score=\"{s}\" \
data-view_count=\"{v}\" data-like_count=\"{l}\" data-subscriber_count=\"{c}\">\
<img src=\"{thumb}\" alt=\"{title_attr}\" loading=\"lazy\" \
onerror=\"this.onerror=null;this.src='{fallback}'\">\
<span class=\"badge\">{badge}</span>\
<h3>{title}</h3><p>by {creator}</p>\
<footer><span>{views} views</span><span>{likes} likes</span><span>{subs} subs</span></footer></a>",
        hidden = if entry.visible { "" } else { " hidden" },
        href = escape(&card.href),
        position = entry.position,
        title_attr = escape(&card.title),
        creator_attr = escape(&card.creator_name),
        s = metrics[0],
        v = metrics[1],
        l = metrics[2],
        c = metrics[3],
        thumb = escape(&card.thumbnail),
        fallback = escape(&card.fallback_thumbnail),
        badge = escape(&card.badge),
        title = escape(&card.title),
        creator = escape(&card.creator_name),
        views = escape(&card.views),
        likes = escape(&card.likes),
        subs = escape(&card.subscribers),
    )
}

const NO_RESULTS: &str = "<div class=\"empty\"><h3>No Results Found</h3>\
<p>Try adjusting your search or run the backend bots to find more outliers.</p></div>";

pub fn render_dashboard(page: &DashboardPage<'_>) -> String {
    let view = page.view;
    let mut options = String::new();
    for key in SortKey::ALL {
        let selected = if key == view.sort().key { " selected" } else { "" };
        let _ = write!(
            options,
            "<option value=\"{}\"{}>{}</option>",
            key.as_str(),
            selected,
            key.label()
        );
    }

    let controls = format!(
        "<form class=\"controls\" method=\"get\" action=\"/dashboard\">\
<input id=\"search\" type=\"search\" name=\"q\" placeholder=\"Search by title or creator...\" value=\"{}\">\
<label>Sort by: <select id=\"sort\" name=\"sort\">{}</select></label></form>",
        escape(view.filter()),
        options
    );

    let content = match view.content() {
        DashboardContent::Loading => "<p class=\"status\">Loading data...</p>".to_string(),
        DashboardContent::Error(msg) => format!("<p class=\"status error\">{}</p>", escape(&msg)),
        // Filtered-out cards are rendered hidden so the browser can bring
        // them back without a refetch.
        content @ (DashboardContent::NoResults | DashboardContent::Cards(_)) => {
            let mut grid = String::from("<div id=\"grid\">");
            for entry in view.grid() {
                grid.push_str(&render_card(&entry));
            }
            grid.push_str("</div>");
            if content == DashboardContent::NoResults {
                grid.push_str(NO_RESULTS);
            } else {
                grid.push_str(&NO_RESULTS.replace("class=\"empty\"", "class=\"empty\" hidden"));
            }
            grid
        }
    };

    let script = format!(
        r#"<script>
(function () {{
  var delay = {delay};
  var grid = document.getElementById("grid");
  var search = document.getElementById("search");
  var sort = document.getElementById("sort");
  var empty = document.querySelector(".empty");
  if (!grid) return;
  var cards = Array.prototype.slice.call(grid.children);
  var timer = null;
  function apply() {{
    var term = search.value.toLowerCase();
    var key = sort.value;
    var shown = cards.filter(function (c) {{
      return !term || c.dataset.title.toLowerCase().indexOf(term) !== -1 ||
        c.dataset.creator.toLowerCase().indexOf(term) !== -1;
    }});
    var metric = function (c) {{ return parseFloat(c.dataset[key]) || 0; }};
    var order = cards.slice().sort(function (a, b) {{
      var d = metric(b) - metric(a);
      return d !== 0 ? d : a.dataset.position - b.dataset.position;
    }});
    order.forEach(function (c) {{
      c.hidden = shown.indexOf(c) === -1;
      grid.appendChild(c);
    }});
    if (empty) empty.hidden = shown.length > 0;
  }}
  search.addEventListener("input", function (e) {{
    e.preventDefault();
    clearTimeout(timer);
    timer = setTimeout(apply, delay);
  }});
  sort.addEventListener("change", apply);
  search.form.addEventListener("submit", function (e) {{ e.preventDefault(); apply(); }});
}})();
</script>"#,
        delay = page.debounce_ms
    );

    let body = format!(
        "{}\n<main>\n<h1>Outlier Dashboard</h1>\n{}\n{}\n</main>\n{}",
        header(page.profile),
        controls,
        content,
        script
    );
    layout(Some("Dashboard"), &body)
}

// ============ Subscribe ============

pub struct SubscribePage<'a> {
    pub profile: &'a Profile,
    pub script_url: &'a str,
    pub client_token: Option<&'a str>,
    pub environment: &'a str,
}

pub fn render_subscribe(page: &SubscribePage<'_>) -> String {
    let greeting = format!(
        "<h1>One Last Step!</h1><p>Welcome, {}! Unlock the full power of NicheFire.</p>",
        escape(page.profile.first_name.as_deref().unwrap_or("there"))
    );
    let plan = "<section class=\"plan\"><h3>NicheFire Pro</h3><p>Monthly Subscription</p>\
<p class=\"price\"><strong>$18</strong>/month</p>\
<ul><li>Unlimited Outlier Discovery</li><li>24/7 Data Collection</li>\
<li>High-Speed Data Enrichment</li></ul>";

    let Some(token) = page.client_token.filter(|t| !t.trim().is_empty()) else {
        let body = format!(
            "{}\n<main>\n{}\n{}<p class=\"error\">Payments are not configured. Please contact support.</p>\
<button disabled>{}</button></section>\n</main>",
            header(Some(page.profile)),
            greeting,
            plan,
            escape(SubscribeState::ProviderUnavailable.button_label())
        );
        return layout(Some("Subscribe"), &body);
    };

    let script = format!(
        r#"<script src="{src}" async id="billing-script"></script>
<script>
(function () {{
  var button = document.getElementById("subscribe");
  var error = document.getElementById("subscribe-error");
  var redirected = false;
  var initialized = false;
  var labels = {{ ready: {ready_label}, submitting: {submitting_label} }};
  var user = {{ userEmail: {email}, userId: {id} }};
  function ready() {{
    if (initialized || !window.Paddle) return;
    initialized = true;
    if ({env} !== "production") window.Paddle.Environment.set({env});
    window.Paddle.Initialize({{
      token: {token},
      eventCallback: function (ev) {{
        if (ev && ev.name === {completed} && !redirected) {{
          redirected = true;
          window.location.href = "/dashboard";
        }}
        if (ev && ev.name === {closed} && !redirected) {{
          button.disabled = false;
          button.textContent = labels.ready;
        }}
      }}
    }});
    button.disabled = false;
    button.textContent = labels.ready;
  }}
  function fail() {{
    error.hidden = false;
    button.disabled = false;
    button.textContent = labels.ready;
  }}
  var tag = document.getElementById("billing-script");
  tag.addEventListener("load", ready);
  // A cached script may have run before this listener was attached.
  if (window.Paddle) ready();
  window.addEventListener("pagehide", function () {{ tag.remove(); }});
  button.addEventListener("click", function () {{
    if (!window.Paddle || button.disabled) return;
    button.disabled = true;
    button.textContent = labels.submitting;
    error.hidden = true;
    fetch("/api/create-payment-link", {{
      method: "POST",
      headers: {{ "Content-Type": "application/json" }},
      body: JSON.stringify(user)
    }}).then(function (r) {{
      return r.ok ? r.json() : Promise.reject(r.status);
    }}).then(function (data) {{
      if (!data || !data.checkoutUrl) return fail();
      var txn = new URL(data.checkoutUrl).searchParams.get("_ptxn");
      if (txn) window.Paddle.Checkout.open({{ transactionId: txn }});
      else window.location.href = data.checkoutUrl;
    }}).catch(fail);
  }});
}})();
</script>"#,
        src = escape(page.script_url),
        email = js_string(page.profile.email.as_deref().unwrap_or("")),
        id = js_string(&page.profile.id),
        env = js_string(page.environment),
        token = js_string(token),
        ready_label = js_string(SubscribeState::Ready.button_label()),
        submitting_label = js_string(SubscribeState::Submitting.button_label()),
        completed = js_string(CheckoutEvent::Completed.provider_name()),
        closed = js_string(CheckoutEvent::Closed.provider_name()),
    );

    let body = format!(
        "{}\n<main>\n{}\n{}<button id=\"subscribe\" disabled>{}</button>\
<p id=\"subscribe-error\" class=\"error\" hidden>{}</p></section>\n</main>\n{}",
        header(Some(page.profile)),
        greeting,
        plan,
        escape(SubscribeState::InitializingProvider.button_label()),
        escape(SUBSCRIBE_FAILED),
        script
    );
    layout(Some("Subscribe"), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LinkTemplates;
    use crate::models::Video;

    fn profile() -> Profile {
        Profile {
            id: "user_1".into(),
            email: Some("ada@example.com".into()),
            first_name: Some("Ada".into()),
        }
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn landing_cta_depends_on_session() {
        assert!(render_landing(None, "/sign-up").contains("href=\"/sign-up\">Get Started"));
        assert!(render_landing(Some(&profile()), "/sign-up").contains("Go to Dashboard"));
    }

    #[test]
    fn dashboard_renders_cards_in_view_order() {
        let mut view = DashboardView::new(LinkTemplates::default(), SortKey::ViralScore);
        view.finish_load(Ok(vec![
            Video {
                video_id: "low".into(),
                title: "<script>alert(1)</script>".into(),
                creator_name: "x".into(),
                view_count: Some(1200),
                like_count: None,
                subscriber_count: None,
                viral_score: Some(10.0),
                thumbnail_url: None,
            },
            Video {
                video_id: "high".into(),
                title: "High".into(),
                creator_name: "y".into(),
                view_count: None,
                like_count: None,
                subscriber_count: None,
                viral_score: Some(99.0),
                thumbnail_url: None,
            },
        ]));
        let html = render_dashboard(&DashboardPage {
            view: &view,
            profile: Some(&profile()),
            debounce_ms: 300,
        });
        let high = html.find("shorts/high").unwrap();
        let low = html.find("shorts/low").unwrap();
        assert!(high < low);
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("1.2K views"));
        assert!(html.contains("/static/fallback-thumbnail.jpg"));
        assert!(html.contains("var delay = 300;"));
    }

    #[test]
    fn dashboard_renders_filtered_out_cards_hidden() {
        let mut view = DashboardView::new(LinkTemplates::default(), SortKey::ViralScore);
        view.finish_load(Ok(vec![
            Video {
                video_id: "cat".into(),
                title: "Cat video".into(),
                creator_name: "x".into(),
                view_count: None,
                like_count: None,
                subscriber_count: None,
                viral_score: Some(10.0),
                thumbnail_url: None,
            },
            Video {
                video_id: "dog".into(),
                title: "Dog video".into(),
                creator_name: "y".into(),
                view_count: None,
                like_count: None,
                subscriber_count: None,
                viral_score: Some(99.0),
                thumbnail_url: None,
            },
        ]));
        view.set_filter("cat");
        let html = render_dashboard(&DashboardPage {
            view: &view,
            profile: None,
            debounce_ms: 300,
        });
        assert!(html.contains(
            r#"<a class="card" hidden href="https://www.youtube.com/shorts/dog" target="_blank" rel="noopener noreferrer" data-position="1""#
        ));
        assert!(html.contains(
            r#"<a class="card" href="https://www.youtube.com/shorts/cat" target="_blank" rel="noopener noreferrer" data-position="0""#
        ));
        assert!(html.contains(r#"<div class="empty" hidden>"#));

        view.set_filter("zebra");
        let html = render_dashboard(&DashboardPage {
            view: &view,
            profile: None,
            debounce_ms: 300,
        });
        assert!(html.contains(r#"<div class="empty"><h3>No Results Found"#));
        assert!(html.contains(r#"<a class="card" hidden href="https://www.youtube.com/shorts/cat""#));
    }

    #[test]
    fn dashboard_shows_empty_and_error_states() {
        let mut view = DashboardView::new(LinkTemplates::default(), SortKey::ViralScore);
        view.finish_load(Ok(vec![]));
        let page = DashboardPage {
            view: &view,
            profile: None,
            debounce_ms: 300,
        };
        assert!(render_dashboard(&page).contains("No Results Found"));

        let mut view = DashboardView::new(LinkTemplates::default(), SortKey::ViralScore);
        view.finish_load(Err(anyhow::anyhow!("boom")));
        let page = DashboardPage {
            view: &view,
            profile: None,
            debounce_ms: 300,
        };
        let html = render_dashboard(&page);
        assert!(html.contains(crate::dashboard::FETCH_FAILED));
        assert!(!html.contains("boom"));
    }

    #[test]
    fn subscribe_without_token_is_disabled() {
        let p = profile();
        let html = render_subscribe(&SubscribePage {
            profile: &p,
            script_url: "https://cdn.example/billing.js",
            client_token: None,
            environment: "sandbox",
        });
        assert!(html.contains("Payments are not configured"));
        assert!(!html.contains("billing.js"));
    }

    #[test]
    fn subscribe_embeds_token_and_user() {
        let p = profile();
        let html = render_subscribe(&SubscribePage {
            profile: &p,
            script_url: "https://cdn.example/billing.js",
            client_token: Some("test_tok"),
            environment: "sandbox",
        });
        assert!(html.contains(r#"token: "test_tok""#));
        assert!(html.contains(r#"userEmail: "ada@example.com""#));
        assert!(html.contains("Welcome, Ada!"));
    }

    #[test]
    fn subscribe_script_follows_flow_labels_and_events() {
        let p = profile();
        let html = render_subscribe(&SubscribePage {
            profile: &p,
            script_url: "https://cdn.example/billing.js",
            client_token: Some("test_tok"),
            environment: "sandbox",
        });
        assert!(html.contains(r#"<button id="subscribe" disabled>Loading payment system...</button>"#));
        assert!(html.contains(r#"ready: "Subscribe Now", submitting: "Opening checkout...""#));
        assert!(html.contains(r#"ev.name === "checkout.completed""#));
        assert!(html.contains(r#"ev.name === "checkout.closed""#));
        assert!(html.contains("if (window.Paddle) ready();"));
        assert!(html.contains("if (initialized || !window.Paddle) return;"));
    }
}
