pub mod flow_service;
