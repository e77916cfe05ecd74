//! `Average`: a moving-window filter with a normalising or mean output.

use crate::error::{ConfigError, RuntimeError};
use crate::fifo::Fifo;
use crate::filter::{
    bool_param, double_param, validate_parameters, EndpointSpec, FilterFactory, FilterSpec,
    FilterState,
};
use crate::value::{Parameter, ParameterSpec, Value, ValueKind};
use crate::filters::INT32_MAX;

fn spec() -> FilterSpec {
    FilterSpec {
        name: "Average".to_string(),
        inputs: vec![EndpointSpec::stream("input")],
        outputs: vec![EndpointSpec::stream("output")],
        parameters: vec![
            ParameterSpec {
                name: "frequency".to_string(),
                kind: ValueKind::Double,
            },
            ParameterSpec {
                name: "normalise".to_string(),
                kind: ValueKind::Bool,
            },
        ],
    }
}

/// Factory for the `Average` filter.
pub struct AverageFactory;

impl FilterFactory for AverageFactory {
    fn spec(&self) -> &FilterSpec {
        static SPEC: std::sync::OnceLock<FilterSpec> = std::sync::OnceLock::new();
        SPEC.get_or_init(spec)
    }

    fn init(&self, params: &[Parameter], frequency: f64) -> Result<Box<dyn FilterState>, ConfigError> {
        let filter_spec = self.spec();
        validate_parameters(filter_spec, params)?;

        let window_hz = double_param(params, "frequency")?;
        let normalise = bool_param(params, "normalise")?;

        if window_hz <= 0.0 || frequency <= 0.0 {
            return Err(ConfigError::FilterInit {
                label: "Average".to_string(),
                reason: format!(
                    "both acquisition frequency ({frequency}) and window frequency ({window_hz}) must be positive"
                ),
            });
        }

        let window_len = (frequency / window_hz).round() as usize;
        if window_len == 0 {
            return Err(ConfigError::FilterInit {
                label: "Average".to_string(),
                reason: format!(
                    "window length rounds to zero for frequency={frequency}, window_hz={window_hz}"
                ),
            });
        }

        Ok(Box::new(AverageState {
            fifo: Fifo::new(window_len, "Average"),
            sum: 0,
            normalise,
        }))
    }
}

struct AverageState {
    fifo: Fifo<u32>,
    sum: u64,
    normalise: bool,
}

impl FilterState for AverageState {
    fn proc(&mut self, inputs: &[Value], outputs: &mut [Value]) -> Result<(), RuntimeError> {
        let input = inputs[0]
            .as_unsigned()
            .expect("resolver guarantees Average's input slot holds an unsigned value");

        if self.fifo.is_full() {
            let oldest = self.fifo.read()?;
            self.sum -= oldest as u64;
        }
        self.fifo.write(input)?;
        self.sum += input as u64;

        let len = self.fifo.len() as u64;
        let mean = self.sum / len;

        outputs[0] = if self.normalise {
            Value::Unsigned(
                INT32_MAX
                    .wrapping_add(input)
                    .wrapping_sub(mean as u32),
            )
        } else {
            Value::Unsigned(mean as u32)
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Parameter;

    fn params(window_hz: f64, normalise: bool) -> Vec<Parameter> {
        vec![
            Parameter {
                name: "frequency".to_string(),
                value: Value::Double(window_hz),
            },
            Parameter {
                name: "normalise".to_string(),
                value: Value::Bool(normalise),
            },
        ]
    }

    fn run(mut state: Box<dyn FilterState>, inputs: &[u32]) -> Vec<u32> {
        inputs
            .iter()
            .map(|&x| {
                let mut out = [Value::Unsigned(0)];
                state
                    .proc(&[Value::Unsigned(x)], &mut out)
                    .expect("proc");
                out[0].as_unsigned().expect("unsigned")
            })
            .collect()
    }

    #[test]
    fn mean_over_window_matches_spec_example() {
        let factory = AverageFactory;
        let state = factory.init(&params(1.0, false), 4.0).expect("init");
        let out = run(state, &[4, 8, 12, 16, 100]);
        assert_eq!(out, vec![4, 6, 8, 10, 34]);
    }

    #[test]
    fn normalising_mean_matches_spec_example() {
        let factory = AverageFactory;
        let state = factory.init(&params(1.0, true), 4.0).expect("init");
        let out = run(state, &[4, 8, 12, 16, 100]);
        let expected: Vec<u32> = vec![0, 2, 4, 6, 66]
            .into_iter()
            .map(|d: u32| INT32_MAX.wrapping_add(d))
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn warm_up_divisor_is_fifo_len_not_capacity() {
        let factory = AverageFactory;
        let state = factory.init(&params(1.0, false), 10.0).expect("init");
        // window length 10, but only 2 samples have arrived: divisor is 2.
        let out = run(state, &[10, 20]);
        assert_eq!(out, vec![10, 15]);
    }

    #[test]
    fn non_positive_window_frequency_is_rejected() {
        let factory = AverageFactory;
        let err = factory.init(&params(0.0, false), 4.0).unwrap_err();
        assert!(matches!(err, ConfigError::FilterInit { .. }));
    }
}
