#![warn(clippy::nursery, clippy::pedantic)]

// Pastegate Web Frontend
// Copyright (C) 2024  The Pastegate Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use gloo_console::{error, log};
use js_sys::{JsString, Promise};
use pastegate_common::flow::{
    ACTION_DELAY, EXPIRED_MESSAGE, HUMAN_CHECK_DELAY, LOAD_FAILED_MESSAGE, NOT_FOUND_MESSAGE,
};
use pastegate_common::{
    navigate, HttpApi, PasteApi, ProgressStore, Reveal, State, Unlock, Url, VerificationSession,
};
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Location, Window};

use crate::render::{ActionGateView, PasteView};
use crate::storage::{describe, js_error, WebStorage};

mod render;
mod storage;

type WebUnlock = Unlock<WebStorage, WebStorage>;

#[wasm_bindgen(raw_module = "../src/render")]
extern "C" {
    #[wasm_bindgen(js_name = renderLoading)]
    pub fn render_loading();
    #[wasm_bindgen(js_name = renderMessage)]
    pub fn render_message(title: JsString, message: JsString);
    #[wasm_bindgen(js_name = renderPasswordGate)]
    pub fn render_password_gate(title: JsString, error: Option<JsString>);
    #[wasm_bindgen(js_name = renderActionGate)]
    pub fn render_action_gate(view: JsValue);
    #[wasm_bindgen(js_name = renderHumanCheck)]
    pub fn render_human_check(verifying: bool);
    #[wasm_bindgen(js_name = renderPaste)]
    pub fn render_paste(view: JsValue);
    #[wasm_bindgen(js_name = createHomeUi)]
    pub fn create_home_ui();
}

/// The paste currently being unlocked in this tab.
#[derive(Clone)]
struct Page {
    api: Rc<HttpApi>,
    origin: Rc<Url>,
    unlock: Rc<RefCell<WebUnlock>>,
}

impl Page {
    fn code(&self) -> String {
        self.unlock.borrow().code().to_string()
    }
}

thread_local! {
    static PAGE: RefCell<Option<Page>> = RefCell::new(None);
}

fn current_page() -> Option<Page> {
    PAGE.with(|page| page.borrow().clone())
}

fn window() -> Window {
    web_sys::window().expect("Failed to get a reference of the window")
}

fn location() -> Location {
    window().location()
}

#[wasm_bindgen]
#[allow(clippy::missing_panics_doc)]
pub fn start(api_base: Option<String>) {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));

    if let Err(e) = route(api_base) {
        error!(format!("[rs] Failed to start: {e:#}"));
        render_message("Error".into(), LOAD_FAILED_MESSAGE.into());
    }
}

fn route(api_base: Option<String>) -> Result<()> {
    let location = location();
    let origin = Url::parse(&location.origin().map_err(js_error)?)?;
    let api_base = match api_base {
        Some(base) => Url::parse(&base).with_context(|| format!("Invalid API base {base}"))?,
        None => origin.join("api")?,
    };

    let mut progress = ProgressStore::new(WebStorage::local()?);
    let mut session = VerificationSession::new(WebStorage::session()?);

    let pathname = location.pathname().map_err(js_error)?;
    match pathname.trim_end_matches('/') {
        "" | "/create" => create_home_ui(),
        "/verify" => match Unlock::resume(progress, session) {
            Some(unlock) => load(Page {
                api: Rc::new(HttpApi::new(api_base)),
                origin: Rc::new(origin),
                unlock: Rc::new(RefCell::new(unlock)),
            }),
            None => location.replace("/").map_err(js_error)?,
        },
        "/content" => match session.verified_paste() {
            Some(paste) => show_paste(&PasteView::new(&paste, &origin)),
            None if progress.last_code().is_some() => {
                location.replace("/verify").map_err(js_error)?;
            }
            None => location.replace("/").map_err(js_error)?,
        },
        path => match path.strip_prefix('/').filter(|code| !code.contains('/')) {
            Some(code) => {
                navigate(code, &mut progress, &mut session)
                    .context("Failed to remember the paste")?;
                location.replace("/verify").map_err(js_error)?;
            }
            None => render_message("Error".into(), NOT_FOUND_MESSAGE.into()),
        },
    }

    Ok(())
}

fn load(page: Page) {
    PAGE.with(|current| *current.borrow_mut() = Some(page.clone()));
    render_loading();

    spawn_local(async move {
        let code = page.code();
        let result = page.api.resolve(&code).await;
        page.unlock.borrow_mut().on_resolved(result);
        render(&page);
    });
}

fn render(page: &Page) {
    let unlock = page.unlock.borrow();
    let paste = unlock.paste();

    match (unlock.state(), paste) {
        (State::Loading, _) => render_loading(),
        (State::Error(message), _) => render_message("Error".into(), message.as_str().into()),
        (State::Expired, _) => render_message("Paste Expired".into(), EXPIRED_MESSAGE.into()),
        (State::PasswordGate { error }, paste) => render_password_gate(
            paste.map_or("Password Protected", |p| p.display_title()).into(),
            error.as_deref().map(JsString::from),
        ),
        (
            State::ActionGate {
                completed,
                processing,
            },
            Some(paste),
        ) => match serde_wasm_bindgen::to_value(&ActionGateView::new(
            paste,
            completed,
            *processing,
        )) {
            Ok(view) => render_action_gate(view),
            Err(e) => render_failure(&e.to_string()),
        },
        (State::HumanCheck { verifying }, _) => render_human_check(*verifying),
        (State::Revealed, Some(paste)) => {
            show_paste(&PasteView::new(paste, &page.origin));
            // Reloading shows the unlocked paste from the session.
            if let Ok(history) = window().history() {
                if let Err(e) = history.replace_state_with_url(&JsValue::NULL, "", Some("/content"))
                {
                    log!(format!("[rs] Failed to update the location: {}", describe(&e)));
                }
            }
        }
        (State::ActionGate { .. } | State::Revealed, None) => {
            render_failure("The paste is missing");
        }
    }
}

fn show_paste(view: &PasteView) {
    match serde_wasm_bindgen::to_value(view) {
        Ok(view) => render_paste(view),
        Err(e) => render_failure(&e.to_string()),
    }
}

fn render_failure(reason: &str) {
    error!(format!("[rs] Failed to render: {reason}"));
    render_message("Error".into(), LOAD_FAILED_MESSAGE.into());
}

#[wasm_bindgen]
pub fn submit_password(password: String) {
    let page = match current_page() {
        Some(page) => page,
        None => return,
    };

    let ready = page.unlock.borrow_mut().prepare_password(&password);
    render(&page);
    if !ready {
        return;
    }

    spawn_local(async move {
        let code = page.code();
        let result = page.api.verify(&code, &password).await;
        page.unlock.borrow_mut().on_password_verified(result);
        render(&page);
    });
}

#[wasm_bindgen]
pub fn click_action(index: usize) {
    let page = match current_page() {
        Some(page) => page,
        None => return,
    };

    let started = page
        .unlock
        .borrow_mut()
        .begin_action(index)
        .map(|action| action.action_url.clone());
    let url = match started {
        Ok(url) => url,
        Err(e) => {
            log!(format!("[rs] Ignoring action {index}: {e}"));
            return;
        }
    };

    if let Err(e) = window().open_with_url_and_target(&url, "_blank") {
        error!(format!("[rs] Failed to open {url}: {}", describe(&e)));
    }
    render(&page);

    spawn_local(async move {
        sleep(ACTION_DELAY).await;
        let finished = page.unlock.borrow_mut().finish_action(index);
        match finished {
            Ok(progress) => log!(format!("[rs] {progress}")),
            Err(e) => error!(format!("[rs] Failed to finish action {index}: {e}")),
        }
        render(&page);
    });
}

#[wasm_bindgen]
pub fn continue_unlock() {
    let page = match current_page() {
        Some(page) => page,
        None => return,
    };

    let reveal = page.unlock.borrow_mut().continue_from_actions();
    match reveal {
        Ok(reveal) => {
            render(&page);
            spawn_local(async move { record_visit(&page, reveal).await });
        }
        Err(e) => log!(format!("[rs] {e}")),
    }
}

#[wasm_bindgen]
pub fn confirm_human() {
    let page = match current_page() {
        Some(page) => page,
        None => return,
    };

    let started = page.unlock.borrow_mut().begin_human_check();
    if let Err(e) = started {
        log!(format!("[rs] {e}"));
        return;
    }
    render(&page);

    spawn_local(async move {
        sleep(HUMAN_CHECK_DELAY).await;
        let reveal = page.unlock.borrow_mut().finish_human_check();
        match reveal {
            Ok(reveal) => {
                render(&page);
                record_visit(&page, reveal).await;
            }
            Err(e) => error!(format!("[rs] {e}")),
        }
    });
}

async fn record_visit(page: &Page, reveal: Reveal) {
    if reveal.record_visit {
        let code = page.code();
        let result = page.api.visit(&code).await;
        page.unlock.borrow_mut().on_visit_recorded(result, Utc::now());
    }
}

async fn sleep(duration: Duration) {
    let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
    let promise = Promise::new(&mut |resolve, _| {
        if let Err(e) =
            window().set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
        {
            error!(format!("[rs] Failed to set a timer: {}", describe(&e)));
        }
    });

    if let Err(e) = JsFuture::from(promise).await {
        error!(format!("[rs] Timer failed: {}", describe(&e)));
    }
}
