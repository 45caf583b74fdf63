// Message types and client stub for `proto/dtx.proto` (package `dtx`).
// Field tags must stay in step with the proto file.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartGlobalRequest {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub mode: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "3")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartGlobalResponse {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitRequest {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SubmitResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AbortRequest {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AbortResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddBranchRequest {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub branch_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub action: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AddBranchResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BranchTryRequest {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub branch_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub action: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "4")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BranchTryResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BranchStateRequest {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub branch_id: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BranchStateResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(string, tag = "1")]
    pub gid: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub txn_json: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRequest {
    #[prost(uint32, tag = "1")]
    pub limit: u32,
    #[prost(uint32, tag = "2")]
    pub offset: u32,
    #[prost(string, tag = "3")]
    pub status: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListResponse {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub txn_json: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct HealthRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthResponse {
    #[prost(string, tag = "1")]
    pub status: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub timestamp_unix: i64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct MetricsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricsResponse {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

/// Client for the `dtx.TransactionService` gRPC service.
pub mod transaction_service_client {
    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::transport::Channel;

    #[derive(Debug, Clone)]
    pub struct TransactionServiceClient {
        inner: tonic::client::Grpc<Channel>,
    }

    impl TransactionServiceClient {
        pub fn new(channel: Channel) -> Self {
            Self {
                inner: tonic::client::Grpc::new(channel),
            }
        }

        async fn unary<Req, Resp>(
            &mut self,
            request: impl tonic::IntoRequest<Req>,
            path: &'static str,
        ) -> std::result::Result<tonic::Response<Resp>, tonic::Status>
        where
            Req: ::prost::Message + Send + Sync + 'static,
            Resp: ::prost::Message + Default + Send + Sync + 'static,
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unavailable(format!("Service was not ready: {}", e))
            })?;
            let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
            self.inner
                .unary(
                    request.into_request(),
                    PathAndQuery::from_static(path),
                    codec,
                )
                .await
        }

        pub async fn start_global(
            &mut self,
            request: impl tonic::IntoRequest<super::StartGlobalRequest>,
        ) -> std::result::Result<tonic::Response<super::StartGlobalResponse>, tonic::Status>
        {
            self.unary(request, "/dtx.TransactionService/StartGlobal")
                .await
        }

        pub async fn submit(
            &mut self,
            request: impl tonic::IntoRequest<super::SubmitRequest>,
        ) -> std::result::Result<tonic::Response<super::SubmitResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/Submit").await
        }

        pub async fn abort(
            &mut self,
            request: impl tonic::IntoRequest<super::AbortRequest>,
        ) -> std::result::Result<tonic::Response<super::AbortResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/Abort").await
        }

        pub async fn add_branch(
            &mut self,
            request: impl tonic::IntoRequest<super::AddBranchRequest>,
        ) -> std::result::Result<tonic::Response<super::AddBranchResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/AddBranch")
                .await
        }

        pub async fn branch_try(
            &mut self,
            request: impl tonic::IntoRequest<super::BranchTryRequest>,
        ) -> std::result::Result<tonic::Response<super::BranchTryResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/BranchTry")
                .await
        }

        pub async fn branch_confirm(
            &mut self,
            request: impl tonic::IntoRequest<super::BranchStateRequest>,
        ) -> std::result::Result<tonic::Response<super::BranchStateResponse>, tonic::Status>
        {
            self.unary(request, "/dtx.TransactionService/BranchConfirm")
                .await
        }

        pub async fn branch_cancel(
            &mut self,
            request: impl tonic::IntoRequest<super::BranchStateRequest>,
        ) -> std::result::Result<tonic::Response<super::BranchStateResponse>, tonic::Status>
        {
            self.unary(request, "/dtx.TransactionService/BranchCancel")
                .await
        }

        pub async fn branch_succeed(
            &mut self,
            request: impl tonic::IntoRequest<super::BranchStateRequest>,
        ) -> std::result::Result<tonic::Response<super::BranchStateResponse>, tonic::Status>
        {
            self.unary(request, "/dtx.TransactionService/BranchSucceed")
                .await
        }

        pub async fn branch_fail(
            &mut self,
            request: impl tonic::IntoRequest<super::BranchStateRequest>,
        ) -> std::result::Result<tonic::Response<super::BranchStateResponse>, tonic::Status>
        {
            self.unary(request, "/dtx.TransactionService/BranchFail")
                .await
        }

        pub async fn get(
            &mut self,
            request: impl tonic::IntoRequest<super::GetRequest>,
        ) -> std::result::Result<tonic::Response<super::GetResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/Get").await
        }

        pub async fn list(
            &mut self,
            request: impl tonic::IntoRequest<super::ListRequest>,
        ) -> std::result::Result<tonic::Response<super::ListResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/List").await
        }

        pub async fn health(
            &mut self,
            request: impl tonic::IntoRequest<super::HealthRequest>,
        ) -> std::result::Result<tonic::Response<super::HealthResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/Health").await
        }

        pub async fn metrics(
            &mut self,
            request: impl tonic::IntoRequest<super::MetricsRequest>,
        ) -> std::result::Result<tonic::Response<super::MetricsResponse>, tonic::Status> {
            self.unary(request, "/dtx.TransactionService/Metrics")
                .await
        }
    }
}
