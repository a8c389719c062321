use burn::backend::NdArray;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, PrettyJsonFileRecorder};
use burn_shufflenet::prelude::*;
use serde_json::Value;
use temp_dir::TempDir;

type TestBackend = NdArray<f32>;

fn tiny_config() -> ShuffleNetV2Config {
    ShuffleNetV2Config::new(vec![vec![16, 16], vec![32], vec![64]], 8, 128).with_classes(10)
}

#[test]
fn stored_weights_load_back_identically() {
    let device = Default::default();
    let dir = TempDir::new().unwrap();
    let store = FileWeightStore::new(dir.path());

    let saved = tiny_config().init::<TestBackend>(&device).unwrap();
    let path = store.save::<TestBackend, _>("tiny", &saved).unwrap();
    assert!(path.is_file());

    let fresh = tiny_config().init::<TestBackend>(&device).unwrap();
    let loaded = store.load::<TestBackend, _>("tiny", fresh, &device).unwrap();

    loaded
        .output
        .weight
        .val()
        .into_data()
        .assert_eq(&saved.output.weight.val().into_data(), true);

    let x = Tensor::<TestBackend, 4>::ones([1, 3, 224, 224], &device);
    loaded
        .forward(x.clone())
        .into_data()
        .assert_eq(&saved.forward(x).into_data(), true);
}

#[test]
fn missing_model_is_a_weight_load_error() {
    let device = Default::default();
    let dir = TempDir::new().unwrap();
    let store = FileWeightStore::new(dir.path());

    let net = tiny_config().init::<TestBackend>(&device).unwrap();
    let err = store.load::<TestBackend, _>("absent", net, &device).unwrap_err();
    assert!(matches!(err, WeightLoadError::Missing { .. }));
}

#[test]
fn factory_loads_pretrained_weights_by_model_name() {
    let device = Default::default();
    let dir = TempDir::new().unwrap();
    let store = FileWeightStore::new(dir.path());

    let config = ShuffleNetV2Variant::Wd2.config().with_classes(10);
    let trained = config.init::<TestBackend>(&device).unwrap();
    store
        .save::<TestBackend, _>(ShuffleNetV2Variant::Wd2.model_name(), &trained)
        .unwrap();

    let loaded = config
        .with_pretrained(true)
        .init_with_store::<TestBackend, _>(&store, &device)
        .unwrap();
    loaded
        .final_block
        .conv
        .weight
        .val()
        .into_data()
        .assert_eq(&trained.final_block.conv.weight.val().into_data(), true);
}

#[test]
fn dotted_model_names_round_trip() {
    let device = Default::default();
    let dir = TempDir::new().unwrap();
    let store = FileWeightStore::new(dir.path());

    let saved = tiny_config().init::<TestBackend>(&device).unwrap();
    let path = store.save::<TestBackend, _>("shufflenetv2_w1.v2", &saved).unwrap();
    assert_eq!(path, dir.path().join("shufflenetv2_w1.v2.mpk"));
    assert!(path.is_file());
    assert!(!dir.path().join("shufflenetv2_w1.mpk").exists());

    let fresh = tiny_config().init::<TestBackend>(&device).unwrap();
    let loaded = store
        .load::<TestBackend, _>("shufflenetv2_w1.v2", fresh, &device)
        .unwrap();
    loaded
        .output
        .bias
        .unwrap()
        .val()
        .into_data()
        .assert_eq(&saved.output.bias.unwrap().val().into_data(), true);
}

#[test]
fn loading_into_another_head_is_a_shape_mismatch() {
    let device = Default::default();
    let dir = TempDir::new().unwrap();
    let store = FileWeightStore::new(dir.path());

    let ten = tiny_config().init::<TestBackend>(&device).unwrap();
    store.save::<TestBackend, _>("tiny", &ten).unwrap();

    let seven = tiny_config().with_classes(7).init::<TestBackend>(&device).unwrap();
    match store.load::<TestBackend, _>("tiny", seven, &device) {
        Err(WeightLoadError::ShapeMismatch {
            model_name,
            name,
            expected,
            stored,
        }) => {
            assert_eq!(model_name, "tiny");
            assert_eq!(name, "output.weight");
            assert_eq!(expected, [128, 7]);
            assert_eq!(stored, [128, 10]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

/// Every `Param` record serializes as `{ "id": .., "param": { "shape": .. } }`.
fn record_params(value: &Value, path: &str, out: &mut Vec<(String, Vec<usize>)>) {
    let join = |key: &str| {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{path}.{key}")
        }
    };
    match value {
        Value::Object(map) if map.contains_key("id") && map.contains_key("param") => {
            let shape = map["param"]["shape"]
                .as_array()
                .unwrap()
                .iter()
                .map(|dim| dim.as_u64().unwrap() as usize)
                .collect();
            out.push((path.to_string(), shape));
        }
        Value::Object(map) => {
            for (key, child) in map {
                record_params(child, &join(key), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                record_params(child, &join(&i.to_string()), out);
            }
        }
        _ => {}
    }
}

#[test]
fn parameter_names_are_the_recorded_keys() {
    let device = Default::default();
    let dir = TempDir::new().unwrap();

    // wide enough for every squeeze-and-excitation gate to keep a channel
    let net = ShuffleNetV2Config::new(vec![vec![64, 64], vec![128]], 8, 128)
        .with_classes(10)
        .with_use_se(true)
        .init::<TestBackend>(&device)
        .unwrap();
    let recorder = PrettyJsonFileRecorder::<FullPrecisionSettings>::new();
    net.clone()
        .save_file(dir.path().join("tiny"), &recorder)
        .unwrap();

    let text = std::fs::read_to_string(dir.path().join("tiny.json")).unwrap();
    let record: Value = serde_json::from_str(&text).unwrap();
    let mut recorded = Vec::new();
    record_params(&record["item"], "", &mut recorded);
    recorded.sort();

    let mut named: Vec<_> = net
        .named_params()
        .into_iter()
        .map(|p| (p.name, p.shape))
        .collect();
    named.sort();

    assert!(named.iter().any(|(name, _)| name == "stages.0.units.1.Regular.se.conv1.weight"));
    assert_eq!(named, recorded);
}
