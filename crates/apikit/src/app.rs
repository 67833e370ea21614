//! App builder - constructs and runs an apikit service

use axum::{Router, middleware};
use std::sync::Arc;

use crate::prelude::*;
pub use apikit_core::app::{App, AppState, VERSION};
use apikit_core::dispatch;
use apikit_core::middleware::{log_requests, optional_auth, require_auth};

fn merge(routes: Option<Router<App>>, more: Router<App>) -> Router<App> {
	match routes {
		Some(routes) => routes.merge(more),
		None => more,
	}
}

pub struct AppBuilder {
	settings: Option<Settings>,
	listen: Box<str>,
	viewsets: Vec<(Box<str>, ConfigurableModelViewSet)>,
	routes: Option<Router<App>>,
	protected: Option<Router<App>>,
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl AppBuilder {
	pub fn new() -> Self {
		// A subscriber may already be installed by the embedding program or a test
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		AppBuilder {
			settings: None,
			listen: "127.0.0.1:8000".into(),
			viewsets: Vec::new(),
			routes: None,
			protected: None,
		}
	}

	pub fn settings(&mut self, settings: Settings) -> &mut Self {
		self.settings = Some(settings);
		self
	}

	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.listen = listen.into();
		self
	}

	/// Mount a model viewset under `prefix`
	pub fn viewset(&mut self, prefix: impl Into<Box<str>>, viewset: ConfigurableModelViewSet) -> &mut Self {
		self.viewsets.push((prefix.into(), viewset));
		self
	}

	/// Extra routes, authenticated only when a token is presented
	pub fn route(&mut self, routes: Router<App>) -> &mut Self {
		self.routes = Some(merge(self.routes.take(), routes));
		self
	}

	/// Extra routes requiring an authenticated user
	pub fn protected(&mut self, routes: Router<App>) -> &mut Self {
		self.protected = Some(merge(self.protected.take(), routes));
		self
	}

	/// Create the app state and assemble the router.
	///
	/// Settings are read from the environment unless set explicitly. Every
	/// viewset configuration is validated here.
	pub fn build(self) -> ApiResult<(App, Router)> {
		let settings = match self.settings {
			Some(settings) => settings,
			None => Settings::from_env()?,
		};
		let app: App = Arc::new(AppState::new(settings)?);

		let mut router = Router::new();
		for (prefix, viewset) in self.viewsets {
			router = router.merge(dispatch::router(app.clone(), &prefix, viewset)?);
		}
		if let Some(routes) = self.routes {
			router = router.merge(
				routes
					.route_layer(middleware::from_fn_with_state(app.clone(), optional_auth))
					.with_state(app.clone()),
			);
		}
		if let Some(protected) = self.protected {
			router = router.merge(
				protected
					.route_layer(middleware::from_fn_with_state(app.clone(), require_auth))
					.with_state(app.clone()),
			);
		}

		Ok((app, router.layer(middleware::from_fn(log_requests))))
	}

	pub async fn run(self) -> ApiResult<()> {
		info!("apikit V{}", VERSION);

		let listen = self.listen.clone();
		let (app, router) = self.build().inspect_err(|err| error!("FATAL: {}", err))?;
		info!(environment = %app.settings.environment, "configuration loaded");

		let listener = tokio::net::TcpListener::bind(&*listen).await.map_err(|err| {
			error!("FATAL: cannot listen on {}: {}", listen, err);
			Error::Io(err)
		})?;
		info!("Listening on {}", listen);
		axum::serve(listener, router).await?;

		Ok(())
	}
}

// vim: ts=4
