/// A connected external-service client (Postgres, blob storage, identity
/// verifier). The required environment is declared as a const so it can be
/// checked before any connection attempt.
#[async_trait::async_trait]
pub trait ModuleClient: Clone + Send + Sync + 'static {
    const NAME: &'static str;
    const ENV_VARS: &'static [&'static str];
    type Client;

    async fn setup_connection() -> Self;
    fn get_client(&self) -> &Self::Client;

    fn validate_env() -> bool {
        let missing: Vec<&'static str> = Self::ENV_VARS
            .iter()
            .copied()
            .filter(|var| std::env::var(var).is_err())
            .collect();

        if missing.is_empty() {
            return true;
        }

        tracing::error!(
            "[{}] missing environment variables: {}",
            Self::NAME,
            missing.join(", ")
        );
        false
    }
}

/// Generates a cheaply cloneable client struct around `client_type`. The
/// `setup` expression runs once, after the declared `env` vars have been
/// checked, and the built client is shared behind an `Arc`.
#[macro_export]
macro_rules! define_module_client {
    {
        (struct $struct_name:ident, $client_name:expr)
        client_type: $client_type:ty,
        env: [ $( $env_var:literal ),* ],
        setup: $setup_logic:expr
    } => {
        #[derive(Clone)]
        pub struct $struct_name {
            client: std::sync::Arc<$client_type>,
        }

        #[async_trait::async_trait]
        impl $crate::ModuleClient for $struct_name {
            const NAME: &'static str = $client_name;
            const ENV_VARS: &'static [&'static str] = &[ $( $env_var ),* ];
            type Client = $client_type;

            async fn setup_connection() -> Self {
                if !Self::validate_env() {
                    panic!("[{}] environment is incomplete, cannot connect", $client_name);
                }

                Self {
                    client: std::sync::Arc::new($setup_logic.await),
                }
            }

            fn get_client(&self) -> &Self::Client {
                &self.client
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ModuleClient;

    crate::define_module_client! {
        (struct GreetingClient, "greeting")
        client_type: String,
        env: ["BACKPACK_TEST_GREETING"],
        setup: async {
            std::env::var("BACKPACK_TEST_GREETING").unwrap_or_default()
        }
    }

    crate::define_module_client! {
        (struct UnconfiguredClient, "unconfigured")
        client_type: String,
        env: ["BACKPACK_TEST_NEVER_SET"],
        setup: async { String::new() }
    }

    #[test]
    fn validate_env_reports_missing_vars() {
        assert!(!UnconfiguredClient::validate_env());
    }

    #[tokio::test]
    async fn setup_connection_shares_the_built_client() {
        std::env::set_var("BACKPACK_TEST_GREETING", "hello");

        let client = GreetingClient::setup_connection().await;
        assert_eq!(client.get_client(), "hello");

        let cloned = client.clone();
        assert_eq!(cloned.get_client(), "hello");
    }
}
