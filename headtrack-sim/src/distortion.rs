use nalgebra::Vector3;
use rand_distr::{Distribution, Normal};

use crate::config::NoiseConfig;

type E = Box<dyn std::error::Error>;

#[derive(Debug, Clone, Default)]
pub struct Distortion {
    noise: Option<[Normal<f32>; 3]>,
    bias: Option<Vector3<f32>>,
}

impl Distortion {
    pub fn new_from_cfg(cfg: &NoiseConfig) -> Result<Self, E> {
        let noise = match cfg.std_dev {
            Some(std_dev) => Some([
                Normal::new(0.0, std_dev[0])?,
                Normal::new(0.0, std_dev[1])?,
                Normal::new(0.0, std_dev[2])?,
            ]),
            None => None,
        };

        Ok(Self {
            noise,
            bias: cfg.bias.map(Vector3::from),
        })
    }

    pub fn apply(&self, input: Vector3<f32>) -> Vector3<f32> {
        let mut output = input;

        if let Some(noise) = &self.noise {
            let mut rng = rand::rng();
            output += Vector3::from_fn(|i, _| noise[i].sample(&mut rng));
        }

        if let Some(bias) = self.bias {
            output += bias;
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_distortion() {
        let distortion = Distortion::new_from_cfg(&NoiseConfig::default()).unwrap();
        let input = Vector3::new(1.0, -2.0, 3.0);
        assert_eq!(distortion.apply(input), input);
    }

    #[test]
    fn test_bias_only() {
        let cfg = NoiseConfig {
            std_dev: None,
            bias: Some([0.5, 0.0, -0.5]),
        };
        let distortion = Distortion::new_from_cfg(&cfg).unwrap();
        assert_eq!(
            distortion.apply(Vector3::zeros()),
            Vector3::new(0.5, 0.0, -0.5)
        );
    }

    #[test]
    fn test_negative_std_dev_is_rejected() {
        assert!(Distortion::new_from_cfg(&NoiseConfig::std_dev(-1.0)).is_err());
    }
}
