//! gRPC façade (§4.7/§6), grounded on `efair::rpc::EFairServer` in
//! `original_source/efair/rpc/server.cpp`. `Infer` keeps the original's
//! submit-then-block contract, but runs the blocking `wait_task` call on a
//! `tokio::task::spawn_blocking` thread rather than the gRPC handler thread
//! directly, since the scheduler core is synchronous and would otherwise stall
//! the async runtime's worker threads.

use std::path::PathBuf;
use std::sync::Arc;
use tonic::{Request, Response, Status};

use crate::error::EfairError;
use crate::profile::Profile;
use crate::scheduler::Scheduler;

pub mod proto {
    tonic::include_proto!("efair");
}

use proto::e_fair_server::EFair;
pub use proto::e_fair_server::EFairServer as EFairGrpcServer;
use proto::{
    CreateEntityRequest, CreateEntityResponse, InferRequest, InferResponse, LoadModelRequest,
    LoadModelResponse, SetEntityPriorityRequest, SetEntityPriorityResponse,
};

pub struct EFairService {
    scheduler: Arc<Scheduler>,
}

impl EFairService {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    pub fn into_server(self) -> EFairGrpcServer<Self> {
        EFairGrpcServer::new(self)
    }
}

fn to_status(err: EfairError) -> Status {
    match err {
        EfairError::NotFound(msg) => Status::not_found(msg),
        EfairError::NoPrivilege(msg) => Status::permission_denied(msg),
        EfairError::Fail(msg) => Status::internal(msg),
    }
}

#[tonic::async_trait]
impl EFair for EFairService {
    async fn load_model(
        &self,
        request: Request<LoadModelRequest>,
    ) -> Result<Response<LoadModelResponse>, Status> {
        let req = request.into_inner();
        let profile = Profile::load(std::path::Path::new(&req.model_profile_path)).map_err(to_status)?;
        let mid = self
            .scheduler
            .load_model(&PathBuf::from(req.model_path), profile, req.eid as usize, req.frequency)
            .map_err(to_status)?;

        Ok(Response::new(LoadModelResponse {
            success: true,
            mid: mid as u64,
        }))
    }

    async fn create_entity(
        &self,
        request: Request<CreateEntityRequest>,
    ) -> Result<Response<CreateEntityResponse>, Status> {
        let req = request.into_inner();
        let eid = self.scheduler.create_entity(req.priority).map_err(to_status)?;
        Ok(Response::new(CreateEntityResponse {
            success: true,
            eid: eid as u64,
        }))
    }

    async fn set_entity_priority(
        &self,
        request: Request<SetEntityPriorityRequest>,
    ) -> Result<Response<SetEntityPriorityResponse>, Status> {
        let req = request.into_inner();
        self.scheduler
            .set_entity_priority(req.eid as usize, req.priority)
            .map_err(to_status)?;
        Ok(Response::new(SetEntityPriorityResponse { success: true }))
    }

    async fn infer(&self, request: Request<InferRequest>) -> Result<Response<InferResponse>, Status> {
        let req = request.into_inner();
        let mid = req.mid as usize;

        let task = self.scheduler.new_task(mid).map_err(to_status)?;
        let tid = task.id;

        let scheduler = Arc::clone(&self.scheduler);
        tokio::task::spawn_blocking(move || scheduler.wait_task(tid))
            .await
            .map_err(|e| Status::internal(format!("wait_task join error: {e}")))?
            .map_err(to_status)?;

        Ok(Response::new(InferResponse {
            success: true,
            tid: tid as u64,
            service_time_us: task.service_time_us(),
            energy_used_uj: task.energy_used_uj(),
        }))
    }
}
