#[allow(clippy::module_inception)]
mod interceptor;
mod refresh;

pub use interceptor::RequestInterceptor;
pub use refresh::RefreshStatus;
