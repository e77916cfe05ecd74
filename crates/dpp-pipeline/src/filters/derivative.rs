//! `Derivative`: a first-difference filter. Stacking two gives a
//! second-order difference.

use crate::error::{ConfigError, RuntimeError};
use crate::filter::{validate_parameters, EndpointSpec, FilterFactory, FilterSpec, FilterState};
use crate::filters::INT32_MAX;
use crate::value::{Parameter, Value};

fn spec() -> FilterSpec {
    FilterSpec {
        name: "Derivative".to_string(),
        inputs: vec![EndpointSpec::stream("input")],
        outputs: vec![EndpointSpec::stream("output")],
        parameters: vec![],
    }
}

/// Factory for the `Derivative` filter.
pub struct DerivativeFactory;

impl FilterFactory for DerivativeFactory {
    fn spec(&self) -> &FilterSpec {
        static SPEC: std::sync::OnceLock<FilterSpec> = std::sync::OnceLock::new();
        SPEC.get_or_init(spec)
    }

    fn init(&self, params: &[Parameter], _frequency: f64) -> Result<Box<dyn FilterState>, ConfigError> {
        validate_parameters(self.spec(), params)?;
        Ok(Box::new(DerivativeState { previous: None }))
    }
}

struct DerivativeState {
    /// The previous raw input. `None` on the very first tick: with no
    /// prior sample to compare against, that tick's delta is treated as
    /// zero (the input acts as its own previous value) so the filter's
    /// first output is `INT32_MAX` rather than an artificial transient.
    previous: Option<u32>,
}

impl FilterState for DerivativeState {
    fn proc(&mut self, inputs: &[Value], outputs: &mut [Value]) -> Result<(), RuntimeError> {
        let input = inputs[0]
            .as_unsigned()
            .expect("resolver guarantees Derivative's input slot holds an unsigned value");
        let previous = self.previous.unwrap_or(input);

        outputs[0] = Value::Unsigned(INT32_MAX.wrapping_add(input).wrapping_sub(previous));
        self.previous = Some(input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn first_difference_matches_spec_example() {
        let factory = DerivativeFactory;
        let state = factory.init(&[], 1.0).expect("init");
        let out = run(state, &[10, 20, 35, 35]);
        assert_eq!(
            out,
            vec![
                INT32_MAX,
                INT32_MAX.wrapping_add(10),
                INT32_MAX.wrapping_add(15),
                INT32_MAX,
            ]
        );
    }

    #[test]
    fn stacked_derivative_of_linear_ramp_is_constant_after_two_samples() {
        let factory = DerivativeFactory;
        let mut first = factory.init(&[], 1.0).expect("init");
        let mut second = factory.init(&[], 1.0).expect("init");

        let ramp: Vec<u32> = (0..6).map(|t| 3 * t + 7).collect();
        let mut results = Vec::new();
        for &x in &ramp {
            let mut mid = [Value::Unsigned(0)];
            first.proc(&[Value::Unsigned(x)], &mut mid).expect("proc");
            let mut out = [Value::Unsigned(0)];
            second.proc(&mid, &mut out).expect("proc");
            results.push(out[0].as_unsigned().expect("unsigned"));
        }

        for value in &results[2..] {
            assert_eq!(*value, INT32_MAX);
        }
    }
}
