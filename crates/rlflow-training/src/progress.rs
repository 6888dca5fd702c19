use crate::identity::WorkflowId;
use crate::pipeline::PipelineStage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        workflow_id: WorkflowId,
    },
    StageStarted {
        workflow_id: WorkflowId,
        stage: PipelineStage,
    },
    StageFinished {
        workflow_id: WorkflowId,
        stage: PipelineStage,
    },
    Finished {
        workflow_id: WorkflowId,
    },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { workflow_id } => println!("[train:{workflow_id}] started"),
            ProgressEvent::StageStarted { workflow_id, stage } => {
                println!("[train:{workflow_id}] {stage}...");
            }
            ProgressEvent::StageFinished { workflow_id, stage } => {
                println!("[train:{workflow_id}] {stage} done");
            }
            ProgressEvent::Finished { workflow_id } => println!("[train:{workflow_id}] finished"),
        }
    }
}
