use std::io;
use std::sync::{Arc, Mutex};

use axum::{extract::Request, middleware::Next, response::Response, Router};
use tracing::subscriber::DefaultGuard;

use crate::features::auth::model::AuthenticatedUser;

/// Header whose value becomes the caller's owner id in tests
pub const TEST_USER_HEADER: &str = "x-test-user";

async fn inject_test_user_middleware(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get(TEST_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(AuthenticatedUser::new);

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

/// Stand-in for the JWT middleware: requests without the test header stay anonymous
pub fn with_test_user_auth(router: Router) -> Router {
    router.layer(axum::middleware::from_fn(inject_test_user_middleware))
}

/// Formatted log output collected on the current thread while its guard is alive
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
