//! Environmental perception tools. Mocks in the request context replace the
//! provider entirely.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use cadence_types::llm::ToolSpec;

use crate::context;
use crate::environment::EnvironmentProvider;
use crate::tools::{Tool, no_parameters, spec};

pub struct LocationWeatherTool<E> {
    env: Arc<E>,
}

impl<E: EnvironmentProvider> LocationWeatherTool<E> {
    pub fn new(env: Arc<E>) -> Self {
        Self { env }
    }
}

impl<E: EnvironmentProvider + 'static> Tool for LocationWeatherTool<E> {
    fn spec(&self) -> ToolSpec {
        spec(
            "get_location_and_weather",
            "Obtiene la ubicación real del usuario (ciudad y país) y el clima actual usando las coordenadas exactas.",
            no_parameters(),
        )
    }

    fn call(&self, _args: Value) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match context::current_env_mocks() {
                Some(mocks) => mocks.render_weather(),
                None => self.env.location_and_weather().await,
            }
        })
    }
}

pub struct TimeContextTool<E> {
    env: Arc<E>,
}

impl<E: EnvironmentProvider> TimeContextTool<E> {
    pub fn new(env: Arc<E>) -> Self {
        Self { env }
    }
}

impl<E: EnvironmentProvider + 'static> Tool for TimeContextTool<E> {
    fn spec(&self) -> ToolSpec {
        spec(
            "get_time_context",
            "Obtiene el día de la semana, la hora actual y el momento del día (mañana/tarde/noche).",
            no_parameters(),
        )
    }

    fn call(&self, _args: Value) -> BoxFuture<'_, String> {
        let answer = match context::current_env_mocks() {
            Some(mocks) => mocks.render_time(),
            None => self.env.time_context(),
        };
        Box::pin(async move { answer })
    }
}

/// Both environmental tools over one provider.
pub fn environment_tools<E: EnvironmentProvider + 'static>(env: Arc<E>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(LocationWeatherTool::new(Arc::clone(&env))),
        Arc::new(TimeContextTool::new(env)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestScope;
    use crate::testing::FixedEnvironment;
    use crate::tools::ToolRegistry;
    use cadence_types::environment::EnvMocks;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.extend(environment_tools(Arc::new(FixedEnvironment)));
        registry
    }

    #[tokio::test]
    async fn test_real_provider_without_mocks() {
        let registry = registry();
        assert_eq!(
            registry.call("get_location_and_weather", json!({})).await,
            "Ubicación: Montevideo, Uruguay | Clima: despejado, 21.0°C"
        );
        assert_eq!(
            registry.call("get_time_context", json!({})).await,
            "Monday, 9:30 (mañana)"
        );
    }

    #[tokio::test]
    async fn test_mocks_replace_provider() {
        let registry = registry();
        let mocks = EnvMocks {
            location: Some("Buenos Aires".to_string()),
            weather: Some("lluvia".to_string()),
            temperature_c: Some(14.0),
            time: None,
            season: Some("invierno".to_string()),
        };
        let (weather, time) = RequestScope::new()
            .with_env_mocks(Some(mocks))
            .run(async {
                (
                    registry.call("get_location_and_weather", Value::Null).await,
                    registry.call("get_time_context", Value::Null).await,
                )
            })
            .await;
        assert_eq!(weather, "Ubicación: Buenos Aires | Clima: lluvia, 14.0°C");
        assert_eq!(time, "season=invierno");
    }

    #[tokio::test]
    async fn test_empty_mocks_report_unavailable() {
        let registry = registry();
        let (weather, time) = RequestScope::new()
            .with_env_mocks(Some(EnvMocks::default()))
            .run(async {
                (
                    registry.call("get_location_and_weather", Value::Null).await,
                    registry.call("get_time_context", Value::Null).await,
                )
            })
            .await;
        assert_eq!(weather, "Ubicación: No disponible | Clima: No disponible");
        assert_eq!(time, "Tiempo: No disponible");
    }
}
