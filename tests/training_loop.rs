//! End-to-end training, prediction and archiving over a scratch database.

mod common;

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::prelude::*;

use common::{data_config, scratch_database, TinyNet};
use reco::{
    DataLoader, EarlyStoppingConfig, GraphBatch, GraphNetwork, LossFunction, Mode, MseLoss,
    PiecewiseLinearLr, PredictionTable, Predictor, Result, RunArchive, RunConfig, ScheduleConfig,
    SqliteEventDataset, Trainer, TrainingConfig,
};

type AD = Autodiff<NdArray>;

fn run_config(max_epochs: usize, patience: usize) -> RunConfig {
    RunConfig {
        data: data_config(2, 0),
        training: TrainingConfig {
            target: "energy".to_string(),
            max_epochs,
            learning_rate: 1e-2,
            early_stopping: EarlyStoppingConfig {
                mode: Mode::Min,
                min_delta: 0.0,
                percentage: false,
                patience,
            },
        },
        schedule: None,
    }
}

#[test]
fn test_full_training_run() {
    let dir = tempfile::tempdir().unwrap();
    let events: Vec<i64> = (1..=12).collect();
    let database = scratch_database(dir.path(), "events.db", &events);
    let device = Default::default();

    AD::seed(7);
    let model = TinyNet::<AD>::new(&device);
    let optimizer = AdamConfig::new().init::<AD, TinyNet<AD>>();

    let trainer = Trainer::from_source(
        &database,
        None,
        &run_config(3, 10),
        optimizer,
        MseLoss::new(),
        device,
    )
    .unwrap();

    let (model, report) = trainer.fit(model).unwrap();

    assert_eq!(report.epochs_run, 3);
    assert!(!report.stopped_early);
    // 12 events -> 8 train events -> 4 batches of 2.
    assert_eq!(report.batches_per_epoch, 4);
    assert!(report.final_train_loss.is_finite());
    assert!(report.best_validation_loss.is_finite());

    // The restored model is usable for inference.
    let valid_model = model.valid();
    let dataset =
        SqliteEventDataset::new(&database, &data_config(4, 0), None).unwrap();
    let mut loader = DataLoader::new(dataset, 4, false, 0);
    let batch = loader.iter().unwrap().next().unwrap().unwrap();
    let device: <NdArray as Backend>::Device = Default::default();
    let output: Tensor<NdArray, 2> = valid_model.forward(&batch, &device);
    assert_eq!(output.dims(), [4, 1]);
}

/// Validation loss that never improves after the first epoch: MSE drives
/// the gradient steps, while validation always reads 1.0.
struct PlateauLoss;

impl LossFunction<AD> for PlateauLoss {
    fn forward(
        &self,
        prediction: Tensor<AD, 2>,
        batch: &GraphBatch,
        target: &str,
        device: &<AD as Backend>::Device,
    ) -> Result<Tensor<AD, 1>> {
        MseLoss::new().forward(prediction, batch, target, device)
    }
}

impl LossFunction<NdArray> for PlateauLoss {
    fn forward(
        &self,
        _prediction: Tensor<NdArray, 2>,
        _batch: &GraphBatch,
        _target: &str,
        device: &<NdArray as Backend>::Device,
    ) -> Result<Tensor<NdArray, 1>> {
        Ok(Tensor::from_floats([1.0], device))
    }
}

#[test]
fn test_early_stop_restores_first_epoch_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let events: Vec<i64> = (1..=12).collect();
    let database = scratch_database(dir.path(), "events.db", &events);
    let device: <AD as Backend>::Device = Default::default();

    // Flat validation with patience 1 halts in epoch 1 (the second epoch)
    // and must hand back the epoch-0 snapshot.
    AD::seed(7);
    let model = TinyNet::<AD>::new(&device);
    let optimizer = AdamConfig::new().init::<AD, TinyNet<AD>>();
    let trainer = Trainer::from_source(
        &database,
        None,
        &run_config(5, 1),
        optimizer,
        PlateauLoss,
        device.clone(),
    )
    .unwrap();
    let (stopped_model, report) = trainer.fit(model).unwrap();

    assert!(report.stopped_early);
    assert_eq!(report.stopped_at_epoch, Some(1));
    assert_eq!(report.epochs_run, 2);

    // Reference: identical run truncated to one epoch.
    AD::seed(7);
    let model = TinyNet::<AD>::new(&device);
    let optimizer = AdamConfig::new().init::<AD, TinyNet<AD>>();
    let trainer = Trainer::from_source(
        &database,
        None,
        &run_config(1, 1),
        optimizer,
        PlateauLoss,
        device,
    )
    .unwrap();
    let (reference_model, reference_report) = trainer.fit(model).unwrap();
    assert_eq!(reference_report.epochs_run, 1);

    assert_eq!(stopped_model.weights(), reference_model.weights());
}

#[test]
fn test_schedule_covers_the_whole_run() {
    let dir = tempfile::tempdir().unwrap();
    let events: Vec<i64> = (1..=12).collect();
    let database = scratch_database(dir.path(), "events.db", &events);
    let device = Default::default();

    let mut config = run_config(3, 10);
    config.schedule = Some(ScheduleConfig {
        start_lr: 1e-4,
        max_lr: 1e-2,
        end_lr: 1e-4,
    });

    AD::seed(7);
    let model = TinyNet::<AD>::new(&device);
    let optimizer = AdamConfig::new().init::<AD, TinyNet<AD>>();
    let trainer = Trainer::from_source(
        &database,
        None,
        &config,
        optimizer,
        MseLoss::new(),
        device,
    )
    .unwrap();

    // 4 train batches x 3 epochs = 12 optimizer steps; the sized curve
    // (2 up + 10 down + 1) serves all of them without running out.
    let (_, report) = trainer.fit(model).unwrap();
    assert_eq!(report.epochs_run, 3);
}

#[test]
fn test_explicit_schedule_wiring() {
    let dir = tempfile::tempdir().unwrap();
    let events: Vec<i64> = (1..=8).collect();
    let database = scratch_database(dir.path(), "events.db", &events);
    let device = Default::default();

    let config = run_config(2, 10);
    let (train_loader, validation_loader) = reco::make_train_validation_loaders(
        &database,
        None,
        &config.data,
    )
    .unwrap();
    let steps = train_loader.len() * config.training.max_epochs;

    AD::seed(7);
    let model = TinyNet::<AD>::new(&device);
    let optimizer = AdamConfig::new().init::<AD, TinyNet<AD>>();
    let trainer = Trainer::new(
        config.training,
        train_loader,
        validation_loader,
        optimizer,
        MseLoss::new(),
        device,
    )
    .with_schedule(PiecewiseLinearLr::new(1, steps, 1e-4, 1e-2, 1e-4));

    let (_, report) = trainer.fit(model).unwrap();
    assert_eq!(report.epochs_run, 2);
}

#[test]
fn test_predict_and_archive() {
    let dir = tempfile::tempdir().unwrap();
    let events: Vec<i64> = (1..=10).collect();
    let database = scratch_database(dir.path(), "events.db", &events);
    let device: <AD as Backend>::Device = Default::default();

    AD::seed(7);
    let model = TinyNet::<AD>::new(&device);
    let optimizer = AdamConfig::new().init::<AD, TinyNet<AD>>();
    let trainer = Trainer::from_source(
        &database,
        None,
        &run_config(1, 10),
        optimizer,
        MseLoss::new(),
        device.clone(),
    )
    .unwrap();
    let (model, _) = trainer.fit(model).unwrap();
    let model = model.valid();

    // Predict over the full selection, exercising the worker path.
    let dataset = SqliteEventDataset::new(&database, &data_config(3, 2), None).unwrap();
    let loader = DataLoader::new(dataset, 3, false, 2);
    let predictor = Predictor::<NdArray>::new(
        loader,
        "energy",
        vec!["energy_pred".to_string()],
        device,
    );
    let table = predictor.predict(model.clone()).unwrap();

    assert_eq!(table.len(), 10);
    assert_eq!(table.event_nos, events);
    assert_eq!(table.header(), vec!["energy_pred", "event_no", "energy"]);

    let archive = RunArchive::new(dir.path().join("archive"));
    let run_dir = archive
        .save_results::<NdArray, _>(&database, "energy_v1", &table, &model)
        .unwrap();
    assert!(run_dir.join("results.csv").exists());
    assert!(run_dir.join("energy_v1.mpk").exists());
}

#[test]
fn test_post_processing_replaces_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let events: Vec<i64> = (1..=6).collect();
    let database = scratch_database(dir.path(), "events.db", &events);
    let device: <NdArray as Backend>::Device = Default::default();

    NdArray::<f32>::seed(3);
    let model = TinyNet::<NdArray>::new(&device);

    let dataset = SqliteEventDataset::new(&database, &data_config(2, 0), None).unwrap();
    let loader = DataLoader::new(dataset, 2, false, 0);
    let predictor = Predictor::<NdArray>::new(
        loader,
        "energy",
        vec!["energy_pred".to_string()],
        device,
    )
    .with_post_processing(|table, target| {
        assert_eq!(target, "energy");
        let doubled = table
            .predictions
            .iter()
            .map(|row| row.iter().map(|v| v * 2.0).collect())
            .collect();
        PredictionTable::new(
            table.output_columns.clone(),
            doubled,
            table.event_nos.clone(),
            table.target_name.clone(),
            table.targets.clone(),
        )
    });

    let raw_model = model.clone();
    let table = predictor.predict(model).unwrap();

    // Compare against an un-post-processed pass.
    let dataset = SqliteEventDataset::new(&database, &data_config(2, 0), None).unwrap();
    let loader = DataLoader::new(dataset, 2, false, 0);
    let plain = Predictor::<NdArray>::new(
        loader,
        "energy",
        vec!["energy_pred".to_string()],
        Default::default(),
    )
    .predict(raw_model)
    .unwrap();

    for (doubled, raw) in table.predictions.iter().zip(&plain.predictions) {
        assert!((doubled[0] - raw[0] * 2.0).abs() < 1e-6);
    }
}
