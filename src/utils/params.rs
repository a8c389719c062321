//! Hierarchical inventory of the tensors a module owns.
//!
//! Names are dot-separated paths through the module record: struct fields by
//! name, `Vec` items by index and enum modules by variant
//! (e.g. `stages.0.units.1.Regular.transform.compress_bn1.gamma`), the same
//! keys the named recorders write.

use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, Linear};
use burn::prelude::*;

/// A single named tensor owned by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamEntry {
    pub name: String,
    pub shape: Vec<usize>,
    /// `false` for normalization statistics, which are stored but not trained.
    pub learnable: bool,
}

impl ParamEntry {
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }
}

pub trait NamedParams {
    /// Appends every owned tensor, with names prefixed by `prefix`.
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>);

    fn named_params(&self) -> Vec<ParamEntry> {
        let mut out = Vec::new();
        self.collect_params("", &mut out);
        out
    }

    /// Number of trainable scalars (normalization statistics excluded).
    fn learnable_params(&self) -> usize {
        self.named_params()
            .iter()
            .filter(|p| p.learnable)
            .map(ParamEntry::num_elements)
            .sum()
    }
}

pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn push(out: &mut Vec<ParamEntry>, prefix: &str, name: &str, dims: &[usize], learnable: bool) {
    out.push(ParamEntry {
        name: join(prefix, name),
        shape: dims.to_vec(),
        learnable,
    });
}

impl<B: Backend> NamedParams for Conv2d<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        push(out, prefix, "weight", &self.weight.dims(), true);
        if let Some(bias) = &self.bias {
            push(out, prefix, "bias", &bias.dims(), true);
        }
    }
}

impl<B: Backend, const D: usize> NamedParams for BatchNorm<B, D> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        push(out, prefix, "gamma", &self.gamma.dims(), true);
        push(out, prefix, "beta", &self.beta.dims(), true);
        push(out, prefix, "running_mean", &self.running_mean.value().dims(), false);
        push(out, prefix, "running_var", &self.running_var.value().dims(), false);
    }
}

impl<B: Backend> NamedParams for Linear<B> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        push(out, prefix, "weight", &self.weight.dims(), true);
        if let Some(bias) = &self.bias {
            push(out, prefix, "bias", &bias.dims(), true);
        }
    }
}

impl<T: NamedParams> NamedParams for Option<T> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        if let Some(inner) = self {
            inner.collect_params(prefix, out);
        }
    }
}

impl<T: NamedParams> NamedParams for Vec<T> {
    fn collect_params(&self, prefix: &str, out: &mut Vec<ParamEntry>) {
        for (i, item) in self.iter().enumerate() {
            item.collect_params(&join(prefix, &i.to_string()), out);
        }
    }
}
