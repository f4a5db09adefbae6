//! Training Drivers
//!
//! The epoch/mini-batch loop shared by the single-database and
//! multi-database trainers: forward, loss, backward, optimizer step at the
//! current learning rate, schedule advance, per-epoch validation and
//! early-stopping delegation, finished by restoring the best snapshot.

use std::marker::PhantomData;
use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use tracing::info;

use crate::config::{RunConfig, TrainingConfig};
use crate::data::{make_train_validation_loaders, DataLoader};
use crate::error::Result;
use crate::model::{GraphNetwork, LossFunction};
use crate::training::early_stopping::EarlyStopping;
use crate::training::schedule::PiecewiseLinearLr;

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Epochs actually run
    pub epochs_run: usize,
    /// Mini-batches per epoch across all sources
    pub batches_per_epoch: usize,
    /// Mean training loss of the last epoch
    pub final_train_loss: f64,
    /// Best validation loss observed
    pub best_validation_loss: f64,
    /// Whether early stopping ended the run
    pub stopped_early: bool,
    /// Epoch index that triggered the halt
    pub stopped_at_epoch: Option<usize>,
}

/// Training driver for a single (training, validation) source
pub struct Trainer<B: AutodiffBackend, M, O, L> {
    train_loader: DataLoader,
    validation_loader: DataLoader,
    config: TrainingConfig,
    optimizer: O,
    loss: L,
    schedule: Option<PiecewiseLinearLr>,
    device: B::Device,
    _model: PhantomData<M>,
}

impl<B, M, O, L> Trainer<B, M, O, L>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + GraphNetwork<B>,
    M::InnerModule: GraphNetwork<B::InnerBackend>,
    O: Optimizer<M, B>,
    L: LossFunction<B> + LossFunction<B::InnerBackend>,
{
    /// Create a driver over prebuilt loaders
    pub fn new(
        config: TrainingConfig,
        train_loader: DataLoader,
        validation_loader: DataLoader,
        optimizer: O,
        loss: L,
        device: B::Device,
    ) -> Self {
        Self {
            train_loader,
            validation_loader,
            config,
            optimizer,
            loss,
            schedule: None,
            device,
            _model: PhantomData,
        }
    }

    /// Create a driver directly from one database source. The selection is
    /// split into training and validation subsets before any loop begins,
    /// and the learning-rate schedule (when configured) is sized off the
    /// resulting training loader.
    pub fn from_source(
        database: impl Into<PathBuf>,
        selection: Option<Vec<i64>>,
        config: &RunConfig,
        optimizer: O,
        loss: L,
        device: B::Device,
    ) -> Result<Self> {
        let database = database.into();
        let (train_loader, validation_loader) =
            make_train_validation_loaders(&database, selection, &config.data)?;

        let schedule = config.schedule.as_ref().map(|schedule| {
            PiecewiseLinearLr::for_run(
                train_loader.len(),
                train_loader.len(),
                config.training.max_epochs,
                schedule,
            )
        });

        let mut trainer = Self::new(
            config.training.clone(),
            train_loader,
            validation_loader,
            optimizer,
            loss,
            device,
        );
        trainer.schedule = schedule;
        Ok(trainer)
    }

    /// Attach a learning-rate schedule
    pub fn with_schedule(mut self, schedule: PiecewiseLinearLr) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Run the full training loop and return the model restored to its
    /// best-validation state, along with a report.
    pub fn fit(self, model: M) -> Result<(M, TrainingReport)> {
        let Self {
            train_loader,
            validation_loader,
            config,
            mut optimizer,
            loss,
            mut schedule,
            device,
            ..
        } = self;
        let mut sources = [(train_loader, validation_loader)];
        run_fit::<B, M, O, L>(
            &mut sources,
            &config,
            &mut schedule,
            &mut optimizer,
            &loss,
            &device,
            model,
        )
    }
}

/// Training driver over several independent database sources.
///
/// Each source keeps its own (training, validation) loader pair, built
/// with the same split as the single-source driver. Every epoch drains
/// source 1's training batches, then source 2's, and so on; validation
/// walks the sources in the same order and averages across all of them.
pub struct MultiDatabaseTrainer<B: AutodiffBackend, M, O, L> {
    sources: Vec<(DataLoader, DataLoader)>,
    config: TrainingConfig,
    optimizer: O,
    loss: L,
    schedule: Option<PiecewiseLinearLr>,
    device: B::Device,
    _model: PhantomData<M>,
}

impl<B, M, O, L> MultiDatabaseTrainer<B, M, O, L>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + GraphNetwork<B>,
    M::InnerModule: GraphNetwork<B::InnerBackend>,
    O: Optimizer<M, B>,
    L: LossFunction<B> + LossFunction<B::InnerBackend>,
{
    /// Create a driver from `(database, selection)` sources. Each source
    /// is split independently; a configured schedule is sized off the
    /// first source's per-epoch step count and the total across sources.
    pub fn from_sources(
        sources: Vec<(PathBuf, Option<Vec<i64>>)>,
        config: &RunConfig,
        optimizer: O,
        loss: L,
        device: B::Device,
    ) -> Result<Self> {
        let mut pairs = Vec::with_capacity(sources.len());
        for (database, selection) in sources {
            pairs.push(make_train_validation_loaders(
                &database,
                selection,
                &config.data,
            )?);
        }

        let total: usize = pairs.iter().map(|(train, _)| train.len()).sum();
        let schedule = match (&config.schedule, pairs.first()) {
            (Some(schedule), Some((first, _))) => Some(PiecewiseLinearLr::for_run(
                first.len(),
                total,
                config.training.max_epochs,
                schedule,
            )),
            _ => None,
        };

        Ok(Self {
            sources: pairs,
            config: config.training.clone(),
            optimizer,
            loss,
            schedule,
            device,
            _model: PhantomData,
        })
    }

    /// Mini-batches per epoch summed across all sources
    pub fn total_training_batches(&self) -> usize {
        self.sources.iter().map(|(train, _)| train.len()).sum()
    }

    /// Run the full training loop; see [`Trainer::fit`].
    pub fn fit(self, model: M) -> Result<(M, TrainingReport)> {
        let Self {
            mut sources,
            config,
            mut optimizer,
            loss,
            mut schedule,
            device,
            ..
        } = self;
        run_fit::<B, M, O, L>(
            &mut sources,
            &config,
            &mut schedule,
            &mut optimizer,
            &loss,
            &device,
            model,
        )
    }
}

/// The epoch loop shared by both drivers
fn run_fit<B, M, O, L>(
    sources: &mut [(DataLoader, DataLoader)],
    config: &TrainingConfig,
    schedule: &mut Option<PiecewiseLinearLr>,
    optimizer: &mut O,
    loss: &L,
    device: &B::Device,
    mut model: M,
) -> Result<(M, TrainingReport)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + GraphNetwork<B>,
    M::InnerModule: GraphNetwork<B::InnerBackend>,
    O: Optimizer<M, B>,
    L: LossFunction<B> + LossFunction<B::InnerBackend>,
{
    let mut stopper = EarlyStopping::from_config(&config.early_stopping);
    let mut current_lr = config.learning_rate;
    let mut epochs_run = 0;
    let mut batches_per_epoch = 0;
    let mut final_train_loss = f64::NAN;
    let mut stopped_at = None;

    for epoch in 0..config.max_epochs {
        let mut acc_loss = 0.0;
        let mut iterations = 0usize;

        for (train_loader, _) in sources.iter_mut() {
            for batch in train_loader.iter()? {
                let batch = batch?;
                let prediction = model.forward(&batch, device);
                let loss_value = <L as LossFunction<B>>::forward(
                    loss,
                    prediction,
                    &batch,
                    &config.target,
                    device,
                )?;

                let grads = GradientsParams::from_grads(loss_value.backward(), &model);
                model = optimizer.step(current_lr, model, grads);
                if let Some(schedule) = schedule.as_mut() {
                    current_lr = schedule.next();
                }

                acc_loss += loss_value.into_scalar().elem::<f64>();
                iterations += 1;
            }
        }

        let train_loss = acc_loss / iterations as f64;
        let validation_loss =
            validate::<B, M, L>(sources, &model, loss, &config.target, device)?;
        info!(
            epoch,
            train_loss,
            validation_loss,
            lr = current_lr,
            "epoch complete"
        );

        epochs_run = epoch + 1;
        batches_per_epoch = iterations;
        final_train_loss = train_loss;

        if stopper.step(validation_loss, &model) {
            info!(epoch, validation_loss, "early stopping");
            stopped_at = Some(epoch);
            break;
        }
    }

    let best = stopper.best_params()?.clone();
    let report = TrainingReport {
        epochs_run,
        batches_per_epoch,
        final_train_loss,
        best_validation_loss: stopper.best().unwrap_or(f64::NAN),
        stopped_early: stopped_at.is_some(),
        stopped_at_epoch: stopped_at,
    };
    Ok((best, report))
}

/// Mean validation loss across every source's validation stream.
///
/// Runs on the inner backend, so gradients are structurally disabled.
fn validate<B, M, L>(
    sources: &mut [(DataLoader, DataLoader)],
    model: &M,
    loss: &L,
    target: &str,
    device: &B::Device,
) -> Result<f64>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    M::InnerModule: GraphNetwork<B::InnerBackend>,
    L: LossFunction<B::InnerBackend>,
{
    let model = model.valid();
    let mut acc_loss = 0.0;
    let mut iterations = 0usize;

    for (_, validation_loader) in sources.iter_mut() {
        for batch in validation_loader.iter()? {
            let batch = batch?;
            let prediction = model.forward(&batch, device);
            let loss_value =
                <L as LossFunction<B::InnerBackend>>::forward(loss, prediction, &batch, target, device)?;
            acc_loss += loss_value.into_scalar().elem::<f64>();
            iterations += 1;
        }
    }

    Ok(acc_loss / iterations as f64)
}
