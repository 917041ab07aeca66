use crate::resources::load_string;

/// WGSL sources of the four programs the renderer compiles at init.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    pub main: String,
    pub shadow: String,
    pub reflect: String,
    pub envcube: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            main: include_str!("../pipelines/main.wgsl").to_string(),
            shadow: include_str!("../pipelines/shadow.wgsl").to_string(),
            reflect: include_str!("../pipelines/reflect.wgsl").to_string(),
            envcube: include_str!("../pipelines/envcube.wgsl").to_string(),
        }
    }
}

impl ShaderSources {
    /// Fetches `main.wgsl`, `shadow.wgsl`, `reflect.wgsl` and `envcube.wgsl` from `dir`.
    pub async fn load(dir: &str) -> anyhow::Result<Self> {
        let path = |name: &str| format!("{}/{}", dir.trim_end_matches('/'), name);
        let (main_path, shadow_path, reflect_path, envcube_path) = (
            path("main.wgsl"),
            path("shadow.wgsl"),
            path("reflect.wgsl"),
            path("envcube.wgsl"),
        );
        let (main, shadow, reflect, envcube) = futures::try_join!(
            load_string(&main_path),
            load_string(&shadow_path),
            load_string(&reflect_path),
            load_string(&envcube_path),
        )?;
        Ok(Self {
            main,
            shadow,
            reflect,
            envcube,
        })
    }
}
