//! Request validation
//!
//! Rejects malformed requests before any data source is contacted.

use crate::api::{
    ConnectorError, ConnectorResult, DataSourceInstance, DataSourceKind, DescribeTableRequest,
    Format, ListSplitsRequest, ReadSplitsRequest, Select,
};

pub fn validate_data_source_instance(instance: &DataSourceInstance) -> ConnectorResult<()> {
    if instance.kind == DataSourceKind::Unspecified {
        return Err(ConnectorError::invalid_request("empty data source kind"));
    }
    if instance.kind.requires_endpoint() {
        match &instance.endpoint {
            None => {
                return Err(ConnectorError::invalid_request(format!(
                    "endpoint is required for {}",
                    instance.kind
                )))
            }
            Some(endpoint) if endpoint.host.is_empty() || endpoint.port == 0 => {
                return Err(ConnectorError::invalid_request("invalid endpoint"))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

pub fn validate_select(select: &Select) -> ConnectorResult<()> {
    validate_data_source_instance(&select.data_source_instance)?;
    if select.table.is_empty() {
        return Err(ConnectorError::EmptyTableName);
    }
    Ok(())
}

pub fn validate_describe_table(request: &DescribeTableRequest) -> ConnectorResult<()> {
    validate_data_source_instance(&request.data_source_instance)?;
    if request.table.is_empty() {
        return Err(ConnectorError::EmptyTableName);
    }
    Ok(())
}

pub fn validate_list_splits(request: &ListSplitsRequest) -> ConnectorResult<()> {
    if request.selects.is_empty() {
        return Err(ConnectorError::invalid_request("empty select list"));
    }
    if request.split_number_limit != 0 {
        return Err(ConnectorError::invalid_request(
            "split_number_limit is not supported",
        ));
    }
    if request.split_size != 0 {
        return Err(ConnectorError::invalid_request("split_size is not supported"));
    }
    request.selects.iter().try_for_each(validate_select)
}

/// Validates the request and resolves an unspecified format
pub fn normalize_read_splits(
    mut request: ReadSplitsRequest,
    default_format: Format,
) -> ConnectorResult<ReadSplitsRequest> {
    if request.splits.is_empty() {
        return Err(ConnectorError::invalid_request("empty split list"));
    }
    for split in &request.splits {
        validate_select(&split.select)?;
    }
    if request.format == Format::Unspecified {
        request.format = default_format;
    }
    Ok(request)
}
