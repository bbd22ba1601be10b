use serde::{Deserialize, Serialize};

/// Fixed audio filter chain baked into an engine when it is constructed.
///
/// The chain is an engine construction option only. Changing the retro audio
/// setting after the engine exists has no effect until the next engine is
/// built, so it must be set before the first load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFilterSpec {
    filters: Vec<String>,
}

impl AudioFilterSpec {
    /// Band-limited, compressed, bit-crushed mono-ish signal with a short echo.
    pub fn retro() -> Self {
        let filters = [
            "highpass=f=150",
            "lowpass=f=6000",
            "acompressor=threshold=0.2:ratio=3:makeup=6",
            "acrusher=bits=8",
            "pan=stereo|c0=0.7*c0+0.3*c1|c1=0.7*c1+0.3*c0",
            "aecho=0.05:0.3:1:0.3",
        ];
        Self {
            filters: filters.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Renders the chain as a single libavfilter graph option value.
    pub fn to_lavfi(&self) -> String {
        format!("lavfi=[{}]", self.filters.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retro_chain_renders_in_order() {
        let spec = AudioFilterSpec::retro();
        let rendered = spec.to_lavfi();

        assert!(rendered.starts_with("lavfi=[highpass=f=150,lowpass=f=6000,"));
        assert!(rendered.ends_with("aecho=0.05:0.3:1:0.3]"));
        assert_eq!(spec.filters().len(), 6);
    }
}
