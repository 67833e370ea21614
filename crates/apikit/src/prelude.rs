pub use apikit_core::prelude::*;

pub use apikit_core::action_config::{ActionConfig, ResponseSerializers};
pub use apikit_core::dispatch::{ConfigurableModelViewSet, ModelStore};
pub use apikit_core::extract::{Auth, OptionalAuth, RequestId};
pub use apikit_core::permission::{
	AllowAny, EngineRequest, HasViewSetActionPermissions, IsAuthenticated, Permission, class,
};
pub use apikit_core::serializer::{Serializer, SerializerRef};
pub use apikit_core::settings::Settings;
pub use apikit_core::viewset::ViewSet;

pub use crate::app::AppBuilder;

// vim: ts=4
